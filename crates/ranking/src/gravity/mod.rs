//! Gravity views
//!
//! A gravity view is the bounded neighbourhood of a focus node as seen by
//! an ego: trusted direct neighbours of the focus (comments and beacons
//! folded into user-to-user edges), capped in fan-out, plus the stitched
//! path from ego to focus.

mod dedup;
mod traversal;

pub use dedup::dedup_transitive;
pub use traversal::TraversalOptions;

use crate::stitcher::{merge_hop_weights, PathStitcher};
use gravity_common::errors::{GravityError, Result};
use gravity_common::metrics;
use gravity_common::{Edge, GraphAccess, NodeBuckets, NodeId, NodeKind};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tracing::{debug, instrument, warn};

/// Options for [`GravityViewBuilder::build_view`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewOptions {
    /// Drop neighbours the ego does not trust
    pub positive_only: bool,

    /// Direct neighbours kept around the focus
    pub limit: usize,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            positive_only: true,
            limit: 3,
        }
    }
}

/// Edges plus the ego's score for every node in them
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GravityView {
    pub edges: Vec<Edge>,

    /// In first-seen order; the focus comes first
    pub node_scores: Vec<(NodeId, f64)>,
}

impl GravityView {
    pub fn contains_node(&self, node: &NodeId) -> bool {
        self.node_scores.iter().any(|(n, _)| n == node)
    }

    pub fn score_of(&self, node: &NodeId) -> Option<f64> {
        self.node_scores.iter().find(|(n, _)| n == node).map(|(_, s)| *s)
    }

    /// Edges leaving `node`
    pub fn out_edges(&self, node: &NodeId) -> impl Iterator<Item = &Edge> + '_ {
        let node = node.clone();
        self.edges.iter().filter(move |e| e.src == node)
    }
}

/// Deduplicated depth-first neighbourhood of a focus
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TraversalView {
    pub edges: Vec<Edge>,
    pub nodes: NodeBuckets,
}

struct Candidate {
    node: NodeId,
    edge: Edge,
    score: f64,
}

/// Builds gravity views over the shared graph
#[derive(Clone)]
pub struct GravityViewBuilder {
    access: GraphAccess,
    stitcher: PathStitcher,
}

impl GravityViewBuilder {
    pub fn new(access: GraphAccess) -> Self {
        let stitcher = PathStitcher::new(access.clone());
        Self { access, stitcher }
    }

    /// Bounded view around `focus` as seen by `ego`
    ///
    /// Unknown neighbours are skipped; any engine error on `ego` or `focus`
    /// fails the call. The focus is always part of the result.
    #[instrument(skip(self, options), fields(positive_only = options.positive_only, limit = options.limit))]
    pub fn build_view(&self, ego: &NodeId, focus: &NodeId, options: &ViewOptions) -> Result<GravityView> {
        let start = Instant::now();
        let focus_score = self.access.score(ego, focus)?;

        let mut candidates = self.neighbours(ego, focus, options)?;
        // Stable, so ties keep engine order
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        candidates.truncate(options.limit);

        let path = match self.stitcher.stitch(ego, focus) {
            Ok(path) => path,
            Err(GravityError::NoPathFound { .. }) => {
                debug!(ego = %ego, focus = %focus, "No path to focus, keeping it isolated");
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        let mut known: HashMap<NodeId, f64> = HashMap::from([(focus.clone(), focus_score)]);
        let mut edges = Vec::with_capacity(path.len() + candidates.len());
        let mut seen_edges = HashSet::new();
        for edge in path {
            if !edge.is_self_edge() && seen_edges.insert((edge.src.clone(), edge.dest.clone())) {
                edges.push(edge);
            }
        }
        for candidate in candidates {
            known.insert(candidate.node, candidate.score);
            let edge = candidate.edge;
            if !edge.is_self_edge() && seen_edges.insert((edge.src.clone(), edge.dest.clone())) {
                edges.push(edge);
            }
        }

        let mut node_scores = vec![(focus.clone(), focus_score)];
        let mut listed = HashSet::from([focus.clone()]);
        for node in edges.iter().flat_map(|e| [&e.src, &e.dest]) {
            if !listed.insert(node.clone()) {
                continue;
            }
            let score = match known.get(node) {
                Some(&score) => score,
                None => match self.access.score(ego, node) {
                    Ok(score) => score,
                    Err(e) if e.is_not_found() => {
                        warn!(node = %node, error = %e, "Skipping unscored node");
                        continue;
                    }
                    Err(e) => return Err(e),
                },
            };
            node_scores.push((node.clone(), score));
        }

        metrics::record_view(start.elapsed().as_secs_f64(), "gravity", edges.len());
        Ok(GravityView { edges, node_scores })
    }

    /// Depth-first neighbourhood of `focus` with duplicate comment
    /// bridges and dead-end comments removed
    #[instrument(skip(self))]
    pub fn build_traversal_view(
        &self,
        ego: &NodeId,
        focus: &NodeId,
        options: &TraversalOptions,
    ) -> Result<TraversalView> {
        let start = Instant::now();
        let (edges, nodes) = traversal::traverse(&self.access, ego, focus, options)?;
        let (edges, nodes) = dedup_transitive(edges, nodes);

        metrics::record_view(start.elapsed().as_secs_f64(), "traversal", edges.len());
        Ok(TraversalView { edges, nodes })
    }

    /// Direct and folded neighbours of `focus`, first edge per neighbour
    fn neighbours(&self, ego: &NodeId, focus: &NodeId, options: &ViewOptions) -> Result<Vec<Candidate>> {
        let mut candidates = Vec::new();
        let mut seen = HashSet::new();

        for edge in self.access.out_edges(focus) {
            let b = &edge.dest;
            if b == focus {
                continue;
            }

            match b.kind() {
                NodeKind::User => {
                    self.consider(ego, b, edge.clone(), options, &mut seen, &mut candidates)?;
                }
                NodeKind::Comment | NodeKind::Beacon => {
                    for hop in self.access.out_edges(b) {
                        let c = &hop.dest;
                        if c == focus || !c.is_user() {
                            continue;
                        }
                        let merged = Edge::new(focus.clone(), c.clone(), merge_hop_weights(edge.weight, hop.weight));
                        self.consider(ego, c, merged, options, &mut seen, &mut candidates)?;
                    }
                }
                NodeKind::Unknown => {
                    warn!(node = %b, "Unknown node type");
                }
            }
        }

        Ok(candidates)
    }

    fn consider(
        &self,
        ego: &NodeId,
        node: &NodeId,
        edge: Edge,
        options: &ViewOptions,
        seen: &mut HashSet<NodeId>,
        candidates: &mut Vec<Candidate>,
    ) -> Result<()> {
        if seen.contains(node) {
            return Ok(());
        }

        let score = match self.access.score(ego, node) {
            Ok(score) => score,
            Err(e) if e.is_not_found() => {
                warn!(node = %node, error = %e, "Skipping unscored neighbour");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if options.positive_only && score <= 0.0 {
            return Ok(());
        }

        seen.insert(node.clone());
        candidates.push(Candidate {
            node: node.clone(),
            edge,
            score,
        });
        Ok(())
    }
}
