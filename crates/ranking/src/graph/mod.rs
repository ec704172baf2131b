//! Weighted graph snapshots and the graph algorithms run over them
//!
//! The rank engine is the system of record; algorithms that need a whole
//! graph (shortest path, centrality) run over a [`WeightedGraph`] snapshot
//! built on demand. [`GraphAlgorithms`] keeps the algorithm implementation
//! swappable.

mod pagerank;

pub use pagerank::{PageRankConfig, PageRankScorer};

use gravity_common::errors::Result;
use gravity_common::{GraphAccess, NodeId};
use petgraph::algo::astar;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// Directed, weighted graph keyed by node id
#[derive(Debug, Clone, Default)]
pub struct WeightedGraph {
    graph: DiGraph<NodeId, f64>,
    index: HashMap<NodeId, NodeIndex>,
}

impl WeightedGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot every edge currently held by the rank engine
    pub fn from_access(access: &GraphAccess) -> Self {
        let mut graph = Self::new();
        for node in access.all_nodes() {
            graph.add_node(&node);
            for edge in access.out_edges(&node) {
                graph.add_edge(&edge.src, &edge.dest, edge.weight);
            }
        }
        graph
    }

    /// Index of `node`, inserting it if needed
    pub fn add_node(&mut self, node: &NodeId) -> NodeIndex {
        if let Some(&idx) = self.index.get(node) {
            return idx;
        }
        let idx = self.graph.add_node(node.clone());
        self.index.insert(node.clone(), idx);
        idx
    }

    /// Insert or overwrite `src -> dest`
    pub fn add_edge(&mut self, src: &NodeId, dest: &NodeId, weight: f64) {
        let a = self.add_node(src);
        let b = self.add_node(dest);
        self.graph.update_edge(a, b, weight);
    }

    pub fn weight(&self, src: &NodeId, dest: &NodeId) -> Option<f64> {
        let a = *self.index.get(src)?;
        let b = *self.index.get(dest)?;
        self.graph.find_edge(a, b).and_then(|e| self.graph.edge_weight(e)).copied()
    }

    pub fn index_of(&self, node: &NodeId) -> Option<NodeIndex> {
        self.index.get(node).copied()
    }

    pub fn node(&self, idx: NodeIndex) -> &NodeId {
        &self.graph[idx]
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Underlying petgraph graph
    pub fn inner(&self) -> &DiGraph<NodeId, f64> {
        &self.graph
    }
}

/// Graph algorithms used by the ranking core
pub trait GraphAlgorithms: Send + Sync {
    /// Minimal-cost node sequence `from ..= to`, if any path exists
    fn shortest_path(&self, graph: &WeightedGraph, from: &NodeId, to: &NodeId) -> Option<Vec<NodeId>>;

    /// Centrality of every node; fails on an empty graph or when the
    /// iteration does not converge
    fn page_rank(&self, graph: &WeightedGraph) -> Result<HashMap<NodeId, f64>>;
}

/// Cost of traversing an edge: strong trust is cheap, zero or negative
/// weight is never preferred over a positive alternative
pub fn edge_cost(weight: f64) -> f64 {
    if weight > 0.0 {
        1.0 / weight
    } else {
        f64::INFINITY
    }
}

/// petgraph-backed algorithms
#[derive(Debug, Clone, Default)]
pub struct PetgraphAlgorithms {
    pub page_rank: PageRankConfig,
}

impl GraphAlgorithms for PetgraphAlgorithms {
    fn shortest_path(&self, graph: &WeightedGraph, from: &NodeId, to: &NodeId) -> Option<Vec<NodeId>> {
        let start = graph.index_of(from)?;
        let goal = graph.index_of(to)?;

        let (_, path) = astar(
            graph.inner(),
            start,
            |n| n == goal,
            |e| edge_cost(*e.weight()),
            |_| 0.0,
        )?;

        Some(path.into_iter().map(|idx| graph.node(idx).clone()).collect())
    }

    fn page_rank(&self, graph: &WeightedGraph) -> Result<HashMap<NodeId, f64>> {
        PageRankScorer::new(self.page_rank.clone()).compute(graph)
    }
}
