//! Zero node maintenance
//!
//! The zero node seeds global ranking with a neutral baseline. Its opinions
//! are periodically rewritten to mirror the current top beacons:
//! 1. Zero every existing out-edge (overwrite, never delete)
//! 2. Fetch the global top beacons
//! 3. Point the zero node at the top `limit` of them, weighted by centrality

mod warmup;

pub use warmup::{warmup, WarmupReport};

use crate::global::GlobalRankCache;
use gravity_common::errors::Result;
use gravity_common::metrics;
use gravity_common::{GraphAccess, NodeId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument};

/// Default number of beacons the zero node points at
pub const DEFAULT_TOP_NODES_LIMIT: usize = 100;

/// Rewrites zero node opinions
#[derive(Clone)]
pub struct ZeroOpinionMaintainer {
    access: GraphAccess,
    cache: Arc<GlobalRankCache>,
}

impl ZeroOpinionMaintainer {
    pub fn new(access: GraphAccess, cache: Arc<GlobalRankCache>) -> Self {
        Self { access, cache }
    }

    /// Rewrite the opinions of `zero`; returns the number of beacons it
    /// now points at
    #[instrument(skip(self))]
    pub fn refresh(&self, zero: &NodeId, top_nodes_limit: usize) -> Result<usize> {
        let previous = self.access.out_edges(zero);
        for edge in &previous {
            self.access.add_edge(zero, &edge.dest, 0.0);
        }

        let top = self.cache.get_top_beacons(None, true)?;
        let mut written = 0;
        for (node, score) in top.iter().filter(|(node, _)| node != zero).take(top_nodes_limit) {
            self.access.add_edge(zero, node, *score);
            written += 1;
        }

        info!(zero = %zero, zeroed = previous.len(), written, "Zero opinions refreshed");
        Ok(written)
    }

    /// Spawn the periodic refresh loop
    ///
    /// One refresh per `period`, never overlapping. A failed refresh is
    /// logged and the loop carries on. Shutdown is honoured between ticks.
    pub fn start_heartbeat(
        &self,
        zero: NodeId,
        top_nodes_limit: usize,
        period: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let maintainer = self.clone();
        tokio::spawn(async move { maintainer.run_heartbeat(zero, top_nodes_limit, period, shutdown).await })
    }

    /// Heartbeat loop body; returns once shutdown is signalled
    pub async fn run_heartbeat(
        self,
        zero: NodeId,
        top_nodes_limit: usize,
        period: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(zero = %zero, period_secs = period.as_secs_f64(), "Zero heartbeat started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let maintainer = self.clone();
            let node = zero.clone();
            let outcome = tokio::task::spawn_blocking(move || maintainer.refresh(&node, top_nodes_limit)).await;

            match outcome {
                Ok(Ok(_)) => metrics::record_zero_refresh(true),
                Ok(Err(e)) => {
                    metrics::record_zero_refresh(false);
                    error!(zero = %zero, error = %e, "Zero refresh failed");
                }
                Err(e) => {
                    metrics::record_zero_refresh(false);
                    error!(zero = %zero, error = %e, "Zero refresh task panicked");
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(period) => {}
                _ = shutdown.changed() => break,
            }
        }

        info!(zero = %zero, "Zero heartbeat stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gravity_common::{Edge, GravityError, MemoryRankEngine};

    fn n(raw: &str) -> NodeId {
        NodeId::parse(raw).unwrap()
    }

    fn setup(edges: &[(&str, &str, f64)]) -> (GraphAccess, Arc<GlobalRankCache>, ZeroOpinionMaintainer) {
        let access = GraphAccess::from(Arc::new(MemoryRankEngine::default()));
        for (src, dest, weight) in edges {
            access.add_edge(&n(src), &n(dest), *weight);
        }
        let cache = Arc::new(GlobalRankCache::new(access.clone()));
        let maintainer = ZeroOpinionMaintainer::new(access.clone(), cache.clone());
        (access, cache, maintainer)
    }

    fn graph() -> Vec<(&'static str, &'static str, f64)> {
        vec![
            ("U1", "B1", 3.0),
            ("U1", "B2", 1.0),
            ("U2", "B1", 1.0),
            ("U2", "B3", 2.0),
            ("U3", "B4", 1.0),
            ("U0", "B9", 1.0),
        ]
    }

    #[test]
    fn test_refresh_points_at_top_beacons() {
        let (access, cache, maintainer) = setup(&graph());
        let zero = n("U0");

        let written = maintainer.refresh(&zero, 2).unwrap();
        assert_eq!(written, 2);

        let top = cache.get_top_beacons(Some(2), true).unwrap();
        let edges = access.out_edges(&zero);

        let live: Vec<Edge> = edges.iter().filter(|e| e.weight != 0.0).cloned().collect();
        assert_eq!(live.len(), 2);
        for (node, score) in &top {
            assert_eq!(access.edge_weight(&zero, node), Some(*score));
        }
        // Previous opinion is zeroed, not removed
        if !top.iter().any(|(node, _)| node == &n("B9")) {
            assert_eq!(access.edge_weight(&zero, &n("B9")), Some(0.0));
        }
    }

    #[test]
    fn test_refresh_skips_zero_itself() {
        let (access, _, maintainer) = setup(&[("U1", "B1", 1.0), ("U2", "B1", 1.0)]);
        let zero = n("B1");

        maintainer.refresh(&zero, 10).unwrap();
        assert_eq!(access.edge_weight(&zero, &zero), None);
    }

    #[test]
    fn test_refresh_propagates_engine_errors() {
        let engine = MemoryRankEngine::from_edges(Default::default(), [Edge::new(n("U1"), n("B1"), 1.0)]);
        engine.calculate_with(&n("U1"), 0).unwrap();
        let access = GraphAccess::from(Arc::new(engine));
        let cache = Arc::new(GlobalRankCache::new(access.clone()));

        let err = ZeroOpinionMaintainer::new(access, cache).refresh(&n("U0"), 10).unwrap_err();
        assert!(matches!(err, GravityError::EmptyScoreCounter { .. }));
    }

    #[tokio::test]
    async fn test_heartbeat_refreshes_and_stops() {
        let (access, _, maintainer) = setup(&graph());
        let (tx, rx) = watch::channel(false);

        let handle = maintainer.start_heartbeat(n("U0"), 3, Duration::from_secs(3600), rx);

        // The first tick runs immediately
        for _ in 0..100 {
            if access.out_edges(&n("U0")).iter().filter(|e| e.weight > 0.0).count() > 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(access.out_edges(&n("U0")).len() > 1);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_heartbeat_survives_failures() {
        let engine = MemoryRankEngine::from_edges(Default::default(), [Edge::new(n("U1"), n("B1"), 1.0)]);
        engine.calculate_with(&n("U1"), 0).unwrap();
        let access = GraphAccess::from(Arc::new(engine));
        let cache = Arc::new(GlobalRankCache::new(access.clone()));
        let maintainer = ZeroOpinionMaintainer::new(access, cache);
        let (tx, rx) = watch::channel(false);

        let handle = maintainer.start_heartbeat(n("U0"), 3, Duration::from_millis(5), rx);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    }
}
