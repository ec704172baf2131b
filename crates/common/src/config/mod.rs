//! Configuration management for Gravity services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values

use crate::errors::{GravityError, Result};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Log levels accepted by `observability.log_level`
pub const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Predicate pushdown listener configuration
    #[serde(default)]
    pub listener: ListenerConfig,

    /// Edge store configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Ranking and maintenance configuration
    #[serde(default)]
    pub rank: RankConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListenerConfig {
    /// Enable the query listener
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Address to bind to
    #[serde(default = "default_listen_addr")]
    pub addr: String,

    /// Stop after this many messages (unbounded when unset)
    pub max_messages: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Postgres URL holding the `edges` table
    pub url: Option<String>,

    /// LISTEN/NOTIFY channel carrying edge updates
    pub edges_channel: Option<String>,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Give up retrying the initial load after this many seconds
    #[serde(default = "default_load_retry")]
    pub load_retry_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RankConfig {
    /// Zero node refreshed by the heartbeat (heartbeat disabled when unset)
    pub zero_node: Option<String>,

    /// Number of top beacons the zero node points at
    #[serde(default = "default_top_nodes_limit")]
    pub top_nodes_limit: usize,

    /// Heartbeat period in seconds
    #[serde(default = "default_heartbeat_period")]
    pub heartbeat_period_secs: u64,

    /// Global ranking cache TTL in seconds
    #[serde(default = "default_cache_ttl")]
    pub global_cache_ttl_secs: u64,

    /// Precompute every user ego on startup
    #[serde(default)]
    pub ego_warmup: bool,

    /// Delay before warmup starts, in seconds
    #[serde(default)]
    pub warmup_delay_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

// Default value functions
fn default_enabled() -> bool { true }
fn default_listen_addr() -> String { "127.0.0.1:10234".to_string() }
fn default_max_connections() -> u32 { 5 }
fn default_connect_timeout() -> u64 { 10 }
fn default_load_retry() -> u64 { 60 }
fn default_top_nodes_limit() -> usize { 100 }
fn default_heartbeat_period() -> u64 { 3600 }
fn default_cache_ttl() -> u64 { 3600 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            addr: default_listen_addr(),
            max_messages: None,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            edges_channel: None,
            max_connections: default_max_connections(),
            connect_timeout_secs: default_connect_timeout(),
            load_retry_secs: default_load_retry(),
        }
    }
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            zero_node: None,
            top_nodes_limit: default_top_nodes_limit(),
            heartbeat_period_secs: default_heartbeat_period(),
            global_cache_ttl_secs: default_cache_ttl(),
            ego_warmup: false,
            warmup_delay_secs: 0,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> std::result::Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__RANK__ZERO_NODE=U000000000000
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Check cross-field constraints and normalize the log level
    pub fn validate(&mut self) -> Result<()> {
        let level = self.observability.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(GravityError::Configuration {
                message: format!(
                    "Invalid log level {:?}. Allowed values are {:?}",
                    self.observability.log_level, VALID_LOG_LEVELS
                ),
            });
        }
        self.observability.log_level = level;

        if self.database.url.is_none() {
            if self.rank.ego_warmup {
                return Err(GravityError::Configuration {
                    message: "Ego warmup requires a database URL".to_string(),
                });
            }
            if self.database.edges_channel.is_some() {
                return Err(GravityError::Configuration {
                    message: "Edges channel (LISTEN/NOTIFY) requires a database URL".to_string(),
                });
            }
        }

        if self.rank.heartbeat_period_secs == 0 {
            return Err(GravityError::Configuration {
                message: "Heartbeat period must be positive".to_string(),
            });
        }

        Ok(())
    }

    /// Get the heartbeat period as Duration
    pub fn heartbeat_period(&self) -> Duration {
        Duration::from_secs(self.rank.heartbeat_period_secs)
    }

    /// Get the global cache TTL as Duration
    pub fn global_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.rank.global_cache_ttl_secs)
    }

    /// Get the warmup delay as Duration
    pub fn warmup_delay(&self) -> Duration {
        Duration::from_secs(self.rank.warmup_delay_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            database: DatabaseConfig::default(),
            rank: RankConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}
