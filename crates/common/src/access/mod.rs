//! Read/write façade over the rank engine
//!
//! `GraphAccess` is cheap to clone and shared by every component. It adds
//! logging and nothing else: no caching happens at this layer.

use crate::engine::RankEngine;
use crate::errors::Result;
use crate::graph::{Edge, NodeId};
use std::sync::Arc;
use tracing::trace;

/// Shared handle to the rank engine
#[derive(Clone)]
pub struct GraphAccess {
    engine: Arc<dyn RankEngine>,
}

impl GraphAccess {
    pub fn new(engine: Arc<dyn RankEngine>) -> Self {
        Self { engine }
    }

    /// Personalized score of `node` for `ego`
    pub fn score(&self, ego: &NodeId, node: &NodeId) -> Result<f64> {
        let score = self.engine.score(ego, node);
        trace!(ego = %ego, node = %node, ok = score.is_ok(), "score");
        score
    }

    /// All scored nodes for `ego`, best first, optionally truncated
    pub fn ranks(&self, ego: &NodeId, limit: Option<usize>) -> Result<Vec<(NodeId, f64)>> {
        self.engine.ranks(ego, limit)
    }

    pub fn edge_weight(&self, src: &NodeId, dest: &NodeId) -> Option<f64> {
        self.engine.edge_weight(src, dest)
    }

    /// Outgoing edges in engine order
    pub fn out_edges(&self, node: &NodeId) -> Vec<Edge> {
        self.engine.out_edges(node)
    }

    /// Insert or overwrite `src -> dest`
    pub fn add_edge(&self, src: &NodeId, dest: &NodeId, weight: f64) {
        trace!(src = %src, dest = %dest, weight, "add_edge");
        self.engine.add_edge(src, dest, weight);
    }

    pub fn all_nodes(&self) -> Vec<NodeId> {
        self.engine.all_nodes()
    }

    /// All known user nodes
    pub fn users(&self) -> Vec<NodeId> {
        self.engine.all_nodes().into_iter().filter(NodeId::is_user).collect()
    }

    /// Recompute the scores of `ego`
    pub fn calculate(&self, ego: &NodeId) -> Result<()> {
        self.engine.calculate(ego)
    }
}

impl std::fmt::Debug for GraphAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphAccess").finish_non_exhaustive()
    }
}

impl<E: RankEngine + 'static> From<Arc<E>> for GraphAccess {
    fn from(engine: Arc<E>) -> Self {
        Self { engine }
    }
}
