//! Weighted PageRank
//!
//! Power iteration with weight-proportional transitions. Mass held by
//! dangling nodes is spread uniformly, so the result always sums to one.

use super::WeightedGraph;
use gravity_common::errors::{GravityError, Result};
use gravity_common::NodeId;
use petgraph::visit::EdgeRef;
use std::collections::HashMap;

/// PageRank configuration
#[derive(Debug, Clone)]
pub struct PageRankConfig {
    /// Damping factor (typically 0.85)
    pub damping: f64,

    /// Maximum iterations
    pub max_iterations: usize,

    /// Per-node convergence tolerance
    pub tolerance: f64,
}

impl Default for PageRankConfig {
    fn default() -> Self {
        Self {
            damping: 0.85,
            max_iterations: 100,
            tolerance: 1e-6,
        }
    }
}

/// PageRank scorer
pub struct PageRankScorer {
    config: PageRankConfig,
}

impl PageRankScorer {
    /// Create a new scorer
    pub fn new(config: PageRankConfig) -> Self {
        Self { config }
    }

    /// Compute PageRank scores for all nodes
    pub fn compute(&self, graph: &WeightedGraph) -> Result<HashMap<NodeId, f64>> {
        let n = graph.node_count();
        if n == 0 {
            return Err(GravityError::Internal {
                message: "PageRank over an empty graph".to_string(),
            });
        }

        let inner = graph.inner();
        let n_f64 = n as f64;
        let damping = self.config.damping;
        let teleport = (1.0 - damping) / n_f64;

        // Precompute outgoing weight totals
        let out_weight: Vec<f64> = inner
            .node_indices()
            .map(|idx| inner.edges(idx).map(|e| *e.weight()).sum())
            .collect();

        let mut scores = vec![1.0 / n_f64; n];

        for _ in 0..self.config.max_iterations {
            let mut next = vec![0.0; n];

            let dangling: f64 = inner
                .node_indices()
                .filter(|idx| out_weight[idx.index()] == 0.0)
                .map(|idx| scores[idx.index()])
                .sum();
            let dangling_share = damping * dangling / n_f64;

            for idx in inner.node_indices() {
                let total = out_weight[idx.index()];
                if total == 0.0 {
                    continue;
                }
                let mass = damping * scores[idx.index()] / total;
                for edge in inner.edges(idx) {
                    next[edge.target().index()] += mass * edge.weight();
                }
            }

            let mut diff = 0.0;
            for (i, value) in next.iter_mut().enumerate() {
                *value += dangling_share + teleport;
                diff += (*value - scores[i]).abs();
            }
            scores = next;

            // Check convergence
            if diff < n_f64 * self.config.tolerance {
                return Ok(inner
                    .node_indices()
                    .map(|idx| (graph.node(idx).clone(), scores[idx.index()]))
                    .collect());
            }
        }

        Err(GravityError::Internal {
            message: format!(
                "PageRank did not converge within {} iterations",
                self.config.max_iterations
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(raw: &str) -> NodeId {
        NodeId::parse(raw).unwrap()
    }

    #[test]
    fn test_pagerank_basic() {
        // U1 -> B1 <- U2, B1 -> U3
        // B1 should have highest score (most incoming weight)
        let mut graph = WeightedGraph::new();
        graph.add_edge(&n("U1"), &n("B1"), 1.0);
        graph.add_edge(&n("U2"), &n("B1"), 1.0);
        graph.add_edge(&n("B1"), &n("U3"), 1.0);

        let scores = PageRankScorer::new(PageRankConfig::default()).compute(&graph).unwrap();

        assert!(scores[&n("B1")] > scores[&n("U1")], "B1 should rank higher than U1");
        let total: f64 = scores.values().sum();
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_pagerank_uses_weights() {
        let mut graph = WeightedGraph::new();
        graph.add_edge(&n("U1"), &n("B1"), 9.0);
        graph.add_edge(&n("U1"), &n("B2"), 1.0);

        let scores = PageRankScorer::new(PageRankConfig::default()).compute(&graph).unwrap();
        assert!(scores[&n("B1")] > scores[&n("B2")]);
    }

    #[test]
    fn test_pagerank_empty_graph() {
        let graph = WeightedGraph::new();
        let scorer = PageRankScorer::new(PageRankConfig::default());

        assert!(scorer.compute(&graph).is_err());
    }

    #[test]
    fn test_pagerank_non_convergence() {
        let mut graph = WeightedGraph::new();
        graph.add_edge(&n("U1"), &n("B1"), 1.0);
        graph.add_edge(&n("B1"), &n("U2"), 1.0);

        let config = PageRankConfig { max_iterations: 1, tolerance: 0.0, ..Default::default() };
        assert!(PageRankScorer::new(config).compute(&graph).is_err());
    }
}
