//! Ego to focus path stitching
//!
//! Finds the cheapest trust path from ego to focus over the full graph and
//! folds comment and beacon hops into direct edges, so the path can be
//! spliced into a view made of user-to-user connections.

use crate::graph::{GraphAlgorithms, PetgraphAlgorithms, WeightedGraph};
use gravity_common::errors::{GravityError, Result};
use gravity_common::{Edge, GraphAccess, NodeId};
use std::sync::Arc;
use tracing::debug;

/// Weight of the synthetic edge replacing `a -> x -> c`
///
/// Product of both hops; two distrust hops yield trust.
pub fn merge_hop_weights(w1: f64, w2: f64) -> f64 {
    if w1 < 0.0 && w2 < 0.0 {
        (w1 * w2).abs()
    } else {
        w1 * w2
    }
}

/// Builds spliceable ego to focus paths
#[derive(Clone)]
pub struct PathStitcher {
    access: GraphAccess,
    algorithms: Arc<dyn GraphAlgorithms>,
}

impl PathStitcher {
    pub fn new(access: GraphAccess) -> Self {
        Self::with_algorithms(access, Arc::new(PetgraphAlgorithms::default()))
    }

    pub fn with_algorithms(access: GraphAccess, algorithms: Arc<dyn GraphAlgorithms>) -> Self {
        Self { access, algorithms }
    }

    /// Stitched path from `ego` to `focus`
    ///
    /// Empty when `ego == focus`; [`GravityError::NoPathFound`] when the
    /// focus is unreachable.
    pub fn stitch(&self, ego: &NodeId, focus: &NodeId) -> Result<Vec<Edge>> {
        if ego == focus {
            return Ok(Vec::new());
        }

        let graph = WeightedGraph::from_access(&self.access);
        let path = self
            .algorithms
            .shortest_path(&graph, ego, focus)
            .ok_or_else(|| GravityError::NoPathFound {
                from: ego.to_string(),
                to: focus.to_string(),
            })?;

        let edges = materialize(&graph, &path);
        debug!(ego = %ego, focus = %focus, hops = path.len().saturating_sub(1), edges = edges.len(), "Stitched path");
        Ok(edges)
    }
}

/// Turn a node path into edges, eliding comment and beacon intermediaries.
/// Path endpoints are always kept.
fn materialize(graph: &WeightedGraph, path: &[NodeId]) -> Vec<Edge> {
    let Some(first) = path.first() else {
        return Vec::new();
    };

    let mut edges = Vec::new();
    let mut anchor = first;
    let mut pending: Option<f64> = None;

    for (i, pair) in path.windows(2).enumerate() {
        let hop = graph.weight(&pair[0], &pair[1]).unwrap_or(0.0);
        let weight = match pending {
            Some(acc) => merge_hop_weights(acc, hop),
            None => hop,
        };

        let node = &pair[1];
        let last = i + 2 == path.len();
        if last || !node.kind().is_pass_through() {
            edges.push(Edge::new(anchor.clone(), node.clone(), weight));
            anchor = node;
            pending = None;
        } else {
            pending = Some(weight);
        }
    }

    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use gravity_common::MemoryRankEngine;

    fn n(raw: &str) -> NodeId {
        NodeId::parse(raw).unwrap()
    }

    fn access(edges: &[(&str, &str, f64)]) -> GraphAccess {
        let access = GraphAccess::from(Arc::new(MemoryRankEngine::default()));
        for (src, dest, weight) in edges {
            access.add_edge(&n(src), &n(dest), *weight);
        }
        access
    }

    #[test]
    fn test_merge_weights() {
        assert_eq!(merge_hop_weights(2.0, 3.0), 6.0);
        assert_eq!(merge_hop_weights(-2.0, 3.0), -6.0);
        assert_eq!(merge_hop_weights(2.0, -3.0), -6.0);
        assert_eq!(merge_hop_weights(-2.0, -3.0), 6.0);
        assert_eq!(merge_hop_weights(0.0, -3.0), 0.0);
    }

    #[test]
    fn test_same_node_is_empty() {
        let stitcher = PathStitcher::new(access(&[("U1", "U2", 1.0)]));
        assert!(stitcher.stitch(&n("U1"), &n("U1")).unwrap().is_empty());
    }

    #[test]
    fn test_elides_comment_hops() {
        let stitcher = PathStitcher::new(access(&[
            ("U1", "C1", 2.0),
            ("C1", "U2", 3.0),
            ("U2", "U3", 1.0),
        ]));

        let edges = stitcher.stitch(&n("U1"), &n("U3")).unwrap();
        assert_eq!(
            edges,
            vec![
                Edge::new(n("U1"), n("U2"), 6.0),
                Edge::new(n("U2"), n("U3"), 1.0),
            ]
        );
    }

    #[test]
    fn test_keeps_beacon_focus() {
        let stitcher = PathStitcher::new(access(&[("U1", "C1", 1.0), ("C1", "B1", 2.0)]));

        let edges = stitcher.stitch(&n("U1"), &n("B1")).unwrap();
        assert_eq!(edges, vec![Edge::new(n("U1"), n("B1"), 2.0)]);
    }

    #[test]
    fn test_double_negative_hop() {
        let stitcher = PathStitcher::new(access(&[("U1", "C1", -1.0), ("C1", "U2", -2.0)]));

        let edges = stitcher.stitch(&n("U1"), &n("U2")).unwrap();
        assert_eq!(edges, vec![Edge::new(n("U1"), n("U2"), 2.0)]);
    }

    #[test]
    fn test_no_path() {
        let stitcher = PathStitcher::new(access(&[("U1", "U2", 1.0), ("U3", "U1", 1.0)]));

        let err = stitcher.stitch(&n("U1"), &n("U3")).unwrap_err();
        assert!(matches!(err, GravityError::NoPathFound { .. }));
    }
}
