//! In-process rank engine
//!
//! Keeps the graph in adjacency lists (insertion ordered) and derives
//! per-ego scores with a personalized power iteration over the signed
//! graph: trust mass flows along positive edges, distrust subtracts along
//! negative ones. Scores are recomputed lazily after the graph changes.

use super::RankEngine;
use crate::errors::{GravityError, Result};
use crate::graph::{Edge, NodeId};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct MemoryRankEngineConfig {
    /// Probability of following an edge instead of returning to the ego
    pub damping: f64,

    /// Power iterations per ego
    pub iterations: usize,

    /// Compute scores on first use instead of failing with `EgoNotInitialized`
    pub lazy: bool,
}

impl Default for MemoryRankEngineConfig {
    fn default() -> Self {
        Self {
            damping: 0.85,
            iterations: 50,
            lazy: true,
        }
    }
}

struct EgoState {
    iterations: usize,
    /// `None` once the graph changed after the last computation
    scores: Option<HashMap<NodeId, f64>>,
}

#[derive(Default)]
struct Inner {
    nodes: Vec<NodeId>,
    known: HashSet<NodeId>,
    adjacency: HashMap<NodeId, Vec<(NodeId, f64)>>,
    egos: HashMap<NodeId, EgoState>,
}

impl Inner {
    fn touch(&mut self, node: &NodeId) {
        if self.known.insert(node.clone()) {
            self.nodes.push(node.clone());
        }
    }
}

/// In-memory [`RankEngine`]
pub struct MemoryRankEngine {
    config: MemoryRankEngineConfig,
    inner: RwLock<Inner>,
}

impl MemoryRankEngine {
    pub fn new(config: MemoryRankEngineConfig) -> Self {
        Self {
            config,
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Build an engine preloaded with `edges`
    pub fn from_edges(config: MemoryRankEngineConfig, edges: impl IntoIterator<Item = Edge>) -> Self {
        let engine = Self::new(config);
        for edge in edges {
            engine.add_edge(&edge.src, &edge.dest, edge.weight);
        }
        engine
    }

    /// Compute `ego` with an explicit iteration count; zero leaves the
    /// ego initialized with an empty score counter
    pub fn calculate_with(&self, ego: &NodeId, iterations: usize) -> Result<()> {
        let mut inner = self.inner.write();
        if !inner.known.contains(ego) {
            return Err(GravityError::not_found(ego));
        }

        let scores = self.compute(&inner, ego, iterations);
        inner.egos.insert(
            ego.clone(),
            EgoState {
                iterations,
                scores: Some(scores),
            },
        );
        Ok(())
    }

    /// Run `f` over the up-to-date score table of `ego`
    fn with_scores<T>(&self, ego: &NodeId, f: impl FnOnce(&HashMap<NodeId, f64>) -> T) -> Result<T> {
        {
            let inner = self.inner.read();
            if let Some(EgoState { iterations, scores: Some(scores) }) = inner.egos.get(ego) {
                if *iterations == 0 {
                    return Err(GravityError::EmptyScoreCounter { ego: ego.to_string() });
                }
                return Ok(f(scores));
            }
        }

        let mut inner = self.inner.write();
        if !inner.known.contains(ego) {
            return Err(GravityError::not_found(ego));
        }

        let iterations = match inner.egos.get(ego) {
            Some(state) => state.iterations,
            None if self.config.lazy => self.config.iterations,
            None => return Err(GravityError::EgoNotInitialized { ego: ego.to_string() }),
        };
        if iterations == 0 {
            return Err(GravityError::EmptyScoreCounter { ego: ego.to_string() });
        }

        // Another writer may have refreshed the table while we waited
        let fresh = matches!(inner.egos.get(ego), Some(EgoState { scores: Some(_), .. }));
        if !fresh {
            let scores = self.compute(&inner, ego, iterations);
            inner.egos.insert(
                ego.clone(),
                EgoState {
                    iterations,
                    scores: Some(scores),
                },
            );
        }

        match inner.egos.get(ego) {
            Some(EgoState { scores: Some(scores), .. }) => Ok(f(scores)),
            _ => Err(GravityError::EgoNotInitialized { ego: ego.to_string() }),
        }
    }

    fn compute(&self, inner: &Inner, ego: &NodeId, iterations: usize) -> HashMap<NodeId, f64> {
        let damping = self.config.damping;
        let out_total = |node: &NodeId| -> f64 {
            inner
                .adjacency
                .get(node)
                .map(|edges| edges.iter().map(|(_, w)| w.abs()).sum())
                .unwrap_or(0.0)
        };

        let mut mass: HashMap<NodeId, f64> = HashMap::from([(ego.clone(), 1.0)]);

        for _ in 0..iterations {
            let mut next: HashMap<NodeId, f64> = HashMap::with_capacity(mass.len());
            let mut returned = 1.0 - damping;

            for (node, &p) in &mass {
                let total = out_total(node);
                if total == 0.0 {
                    returned += damping * p;
                    continue;
                }
                for (dest, w) in inner.adjacency.get(node).into_iter().flatten() {
                    let share = damping * p * w.abs() / total;
                    if *w > 0.0 {
                        *next.entry(dest.clone()).or_default() += share;
                    } else {
                        returned += share;
                    }
                }
            }

            *next.entry(ego.clone()).or_default() += returned;
            mass = next;
        }

        let mut scores = mass.clone();
        for (node, &p) in &mass {
            let total = out_total(node);
            if total == 0.0 {
                continue;
            }
            for (dest, w) in inner.adjacency.get(node).into_iter().flatten() {
                if *w < 0.0 {
                    *scores.entry(dest.clone()).or_default() -= damping * p * w.abs() / total;
                }
            }
        }

        debug!(ego = %ego, iterations, scored = scores.len(), "Computed ego scores");
        scores
    }
}

impl Default for MemoryRankEngine {
    fn default() -> Self {
        Self::new(MemoryRankEngineConfig::default())
    }
}

impl RankEngine for MemoryRankEngine {
    fn score(&self, ego: &NodeId, node: &NodeId) -> Result<f64> {
        if !self.inner.read().known.contains(node) {
            return Err(GravityError::not_found(node));
        }
        self.with_scores(ego, |scores| scores.get(node).copied().unwrap_or(0.0))
    }

    fn ranks(&self, ego: &NodeId, limit: Option<usize>) -> Result<Vec<(NodeId, f64)>> {
        let mut ranks = self.with_scores(ego, |scores| {
            scores
                .iter()
                .filter(|(_, &s)| s != 0.0)
                .map(|(n, &s)| (n.clone(), s))
                .collect::<Vec<_>>()
        })?;

        ranks.sort_by(|a, b| {
            b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0))
        });
        if let Some(limit) = limit {
            ranks.truncate(limit);
        }
        Ok(ranks)
    }

    fn edge_weight(&self, src: &NodeId, dest: &NodeId) -> Option<f64> {
        self.inner
            .read()
            .adjacency
            .get(src)?
            .iter()
            .find(|(d, _)| d == dest)
            .map(|(_, w)| *w)
    }

    fn out_edges(&self, node: &NodeId) -> Vec<Edge> {
        self.inner
            .read()
            .adjacency
            .get(node)
            .map(|edges| {
                edges
                    .iter()
                    .map(|(dest, w)| Edge::new(node.clone(), dest.clone(), *w))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn add_edge(&self, src: &NodeId, dest: &NodeId, weight: f64) {
        let mut inner = self.inner.write();
        inner.touch(src);
        inner.touch(dest);

        let edges = inner.adjacency.entry(src.clone()).or_default();
        match edges.iter_mut().find(|(d, _)| d == dest) {
            Some(existing) => existing.1 = weight,
            None => edges.push((dest.clone(), weight)),
        }

        for state in inner.egos.values_mut() {
            state.scores = None;
        }
    }

    fn all_nodes(&self) -> Vec<NodeId> {
        self.inner.read().nodes.clone()
    }

    fn calculate(&self, ego: &NodeId) -> Result<()> {
        self.calculate_with(ego, self.config.iterations)
    }
}
