//! Edge store bridge
//!
//! Provides:
//! - Initial edge load from Postgres with retry
//! - LISTEN/NOTIFY stream of edge updates
//! - The bridge loop that applies updates to the rank engine in delivery order

use crate::access::GraphAccess;
use crate::config::DatabaseConfig;
use crate::errors::{GravityError, Result};
use crate::graph::{Edge, NodeId};
use crate::metrics;
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgListener, PgPool, PgPoolOptions};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

const LOAD_EDGES_SQL: &str = "SELECT src, dst, amount::float8 FROM edges";

/// Source of the initial edge set
#[async_trait]
pub trait EdgeSource: Send + Sync {
    async fn load_edges(&self) -> Result<Vec<Edge>>;
}

/// Edge update carried by a notification payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeNotification {
    pub src: String,
    pub dest: String,
    pub weight: f64,
}

impl EdgeNotification {
    /// Decode a JSON payload
    pub fn from_payload(payload: &str) -> Result<Self> {
        Ok(serde_json::from_str(payload)?)
    }

    pub fn into_edge(self) -> Result<Edge> {
        Ok(Edge::new(NodeId::parse(self.src)?, NodeId::parse(self.dest)?, self.weight))
    }
}

/// Postgres-backed edge source
#[derive(Clone)]
pub struct PgEdgeSource {
    pool: PgPool,
    channel: Option<String>,
    load_retry: Duration,
}

impl PgEdgeSource {
    /// Connect using the database section of the configuration
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let url = config.url.as_deref().ok_or_else(|| GravityError::Configuration {
            message: "database.url is not set".to_string(),
        })?;

        info!("Connecting to edge store...");
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect_lazy(url)?;

        Ok(Self {
            pool,
            channel: config.edges_channel.clone(),
            load_retry: Duration::from_secs(config.load_retry_secs),
        })
    }

    /// Subscribe to the configured notification channel
    pub async fn notifications(
        &self,
    ) -> Result<impl Stream<Item = Result<EdgeNotification>> + Send + Unpin + 'static> {
        let channel = self.channel.as_deref().ok_or_else(|| GravityError::Configuration {
            message: "database.edges_channel is not set".to_string(),
        })?;

        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(channel).await?;
        info!(channel = %channel, "Listening for edge notifications");

        Ok(listener.into_stream().map(|notification| {
            let notification = notification?;
            EdgeNotification::from_payload(notification.payload())
        }))
    }
}

#[async_trait]
impl EdgeSource for PgEdgeSource {
    #[instrument(skip(self))]
    async fn load_edges(&self) -> Result<Vec<Edge>> {
        let policy = ExponentialBackoff {
            max_elapsed_time: Some(self.load_retry),
            ..Default::default()
        };

        let pool = &self.pool;
        let rows: Vec<(String, String, f64)> = retry(policy, || async move {
            sqlx::query_as(LOAD_EDGES_SQL)
                .fetch_all(pool)
                .await
                .map_err(|e| {
                    warn!(error = %e, "Edge load failed, retrying");
                    backoff::Error::transient(e)
                })
        })
        .await?;

        let mut edges = Vec::with_capacity(rows.len());
        for (src, dest, weight) in rows {
            match (NodeId::parse(&src), NodeId::parse(&dest)) {
                (Ok(src), Ok(dest)) => edges.push(Edge::new(src, dest, weight)),
                _ => warn!(src = %src, dest = %dest, "Skipping edge with invalid node id"),
            }
        }

        info!(count = edges.len(), "Loaded edges");
        Ok(edges)
    }
}

/// Apply a batch of edges; returns how many were written
pub fn apply_edges(access: &GraphAccess, edges: impl IntoIterator<Item = Edge>) -> u64 {
    let mut applied = 0;
    for edge in edges {
        access.add_edge(&edge.src, &edge.dest, edge.weight);
        applied += 1;
    }
    metrics::record_edges_applied("initial_load", applied);
    applied
}

/// Apply every notification exactly once, in delivery order, until the
/// stream ends or shutdown is signalled. Undecodable payloads are logged
/// and skipped. Returns the number of edges applied.
pub async fn run_bridge<S>(mut stream: S, access: GraphAccess, mut shutdown: watch::Receiver<bool>) -> u64
where
    S: Stream<Item = Result<EdgeNotification>> + Unpin,
{
    let mut applied = 0;

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                info!("Edge bridge shutting down");
                break;
            }
            next = stream.next() => match next {
                Some(Ok(notification)) => match notification.into_edge() {
                    Ok(edge) => {
                        debug!(src = %edge.src, dest = %edge.dest, weight = edge.weight, "Applying edge");
                        access.add_edge(&edge.src, &edge.dest, edge.weight);
                        metrics::record_edges_applied("notification", 1);
                        applied += 1;
                    }
                    Err(e) => warn!(error = %e, "Dropping edge notification"),
                },
                Some(Err(e)) => warn!(error = %e, "Edge notification error"),
                None => {
                    info!("Edge notification stream ended");
                    break;
                }
            }
        }
    }

    applied
}
