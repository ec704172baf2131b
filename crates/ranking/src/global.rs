//! Global beacon ranking
//!
//! Folds every user's personalized ranks into one reduced graph of positive
//! user-to-(user|beacon) edges and ranks beacons by their centrality in it.
//! The result lives in a single cache slot with a fixed TTL; at most one
//! computation runs at a time and readers of a fresh entry never wait on it.

use crate::graph::{GraphAlgorithms, PetgraphAlgorithms, WeightedGraph};
use gravity_common::errors::Result;
use gravity_common::metrics;
use gravity_common::{GraphAccess, NodeId};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Default time-to-live of a computed ranking
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

const CACHE_NAME: &str = "global_rank";

/// Beacons with their centrality, best first
pub type Ranking = Arc<Vec<(NodeId, f64)>>;

struct CacheEntry {
    ranking: Ranking,
    created: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.created.elapsed() < ttl
    }
}

/// Single-slot, single-flight cache of the global beacon ranking
pub struct GlobalRankCache {
    access: GraphAccess,
    algorithms: Arc<dyn GraphAlgorithms>,
    ttl: Duration,
    slot: RwLock<Option<CacheEntry>>,
    compute_lock: Mutex<()>,
    computations: AtomicU64,
}

impl GlobalRankCache {
    pub fn new(access: GraphAccess) -> Self {
        Self::with_algorithms(access, Arc::new(PetgraphAlgorithms::default()), DEFAULT_TTL)
    }

    pub fn with_ttl(access: GraphAccess, ttl: Duration) -> Self {
        Self::with_algorithms(access, Arc::new(PetgraphAlgorithms::default()), ttl)
    }

    pub fn with_algorithms(access: GraphAccess, algorithms: Arc<dyn GraphAlgorithms>, ttl: Duration) -> Self {
        Self {
            access,
            algorithms,
            ttl,
            slot: RwLock::new(None),
            compute_lock: Mutex::new(()),
            computations: AtomicU64::new(0),
        }
    }

    /// Top beacons, best first
    ///
    /// `use_cache = false` evicts the slot and recomputes.
    pub fn get_top_beacons(&self, limit: Option<usize>, use_cache: bool) -> Result<Vec<(NodeId, f64)>> {
        let ranking = if use_cache {
            self.cached_or_compute()?
        } else {
            self.recompute()?
        };

        let take = limit.unwrap_or(ranking.len()).min(ranking.len());
        Ok(ranking[..take].to_vec())
    }

    /// Drop the cached ranking
    pub fn clear(&self) {
        *self.slot.write() = None;
    }

    /// Number of rankings computed so far
    pub fn computation_count(&self) -> u64 {
        self.computations.load(Ordering::Relaxed)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn fresh(&self) -> Option<Ranking> {
        self.slot
            .read()
            .as_ref()
            .filter(|entry| entry.is_fresh(self.ttl))
            .map(|entry| entry.ranking.clone())
    }

    fn cached_or_compute(&self) -> Result<Ranking> {
        if let Some(ranking) = self.fresh() {
            metrics::record_cache(true, CACHE_NAME);
            return Ok(ranking);
        }

        let _guard = self.compute_lock.lock();
        // Another caller may have filled the slot while we waited
        if let Some(ranking) = self.fresh() {
            metrics::record_cache(true, CACHE_NAME);
            return Ok(ranking);
        }

        metrics::record_cache(false, CACHE_NAME);
        self.compute_and_store()
    }

    fn recompute(&self) -> Result<Ranking> {
        let _guard = self.compute_lock.lock();
        self.clear();
        self.compute_and_store()
    }

    /// Caller must hold `compute_lock`
    fn compute_and_store(&self) -> Result<Ranking> {
        let ranking = Arc::new(self.compute()?);
        *self.slot.write() = Some(CacheEntry {
            ranking: ranking.clone(),
            created: Instant::now(),
        });
        Ok(ranking)
    }

    #[instrument(skip(self))]
    fn compute(&self) -> Result<Vec<(NodeId, f64)>> {
        let start = Instant::now();
        self.computations.fetch_add(1, Ordering::Relaxed);

        let mut reduced = WeightedGraph::new();
        for ego in self.access.users() {
            for (dest, score) in self.access.ranks(&ego, None)? {
                if (dest.is_user() || dest.is_beacon()) && score > 0.0 && dest != ego {
                    reduced.add_edge(&ego, &dest, score);
                }
            }
        }
        debug!(nodes = reduced.node_count(), edges = reduced.edge_count(), "Reduced graph built");

        let centrality = match self.algorithms.page_rank(&reduced) {
            Ok(centrality) => centrality,
            Err(e) => {
                warn!(error = %e, "Centrality failed, global ranking is empty");
                HashMap::new()
            }
        };

        let mut ranking: Vec<(NodeId, f64)> = centrality.into_iter().filter(|(node, _)| node.is_beacon()).collect();
        ranking.sort_by(|a, b| {
            b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0))
        });

        let elapsed = start.elapsed().as_secs_f64();
        metrics::record_global_rank(elapsed, ranking.len());
        info!(beacons = ranking.len(), elapsed_secs = elapsed, "Global ranking computed");
        Ok(ranking)
    }
}
