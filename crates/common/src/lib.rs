//! Gravity Common Library
//!
//! Shared code for all Gravity crates including:
//! - Tagged node identifiers and edge types
//! - Rank engine abstraction and the in-memory engine
//! - Graph access façade
//! - Error types and handling
//! - Configuration management
//! - Edge store bridge
//! - Metrics and observability

pub mod access;
pub mod config;
pub mod db;
pub mod engine;
pub mod errors;
pub mod graph;
pub mod metrics;

// Re-export commonly used types
pub use access::GraphAccess;
pub use config::AppConfig;
pub use engine::{MemoryRankEngine, RankEngine};
pub use errors::{GravityError, Result};
pub use graph::{Edge, NodeBuckets, NodeId, NodeKind};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
