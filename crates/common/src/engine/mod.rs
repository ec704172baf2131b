//! Personalized rank engine abstraction
//!
//! The engine owns the graph and produces, per ego, a signed score for every
//! other node. Everything else in Gravity reads and writes the graph through
//! this trait.

mod memory;

pub use memory::{MemoryRankEngine, MemoryRankEngineConfig};

use crate::errors::Result;
use crate::graph::{Edge, NodeId};

/// Personalized rank engine
///
/// Failure modes are reported as distinct [`GravityError`](crate::GravityError)
/// variants: `NodeNotFound`, `EgoNotInitialized` and `EmptyScoreCounter`.
pub trait RankEngine: Send + Sync {
    /// Score of `node` from the standpoint of `ego`
    fn score(&self, ego: &NodeId, node: &NodeId) -> Result<f64>;

    /// Every scored node for `ego`, best first
    fn ranks(&self, ego: &NodeId, limit: Option<usize>) -> Result<Vec<(NodeId, f64)>>;

    /// Weight of the `src -> dest` edge, if any
    fn edge_weight(&self, src: &NodeId, dest: &NodeId) -> Option<f64>;

    /// Outgoing edges of `node`, in the engine's iteration order
    fn out_edges(&self, node: &NodeId) -> Vec<Edge>;

    /// Insert or overwrite an edge
    fn add_edge(&self, src: &NodeId, dest: &NodeId, weight: f64);

    /// All nodes known to the engine
    fn all_nodes(&self) -> Vec<NodeId>;

    /// (Re)compute the scores of `ego`
    fn calculate(&self, ego: &NodeId) -> Result<()>;
}
