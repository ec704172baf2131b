//! Depth-bounded ancestry traversal around a focus
//!
//! Walks outward from the focus with an explicit stack over an arena of
//! frames. Each frame points at its parent frame, so the only ancestry
//! rule (never step straight back to the parent) is a single index lookup.
//! Edges come out in depth-first preorder: `parent -> child` immediately
//! followed by the child's own subtree. The transitive dedup pass depends
//! on that order.

use gravity_common::errors::Result;
use gravity_common::{Edge, GraphAccess, NodeBuckets, NodeId, NodeKind};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Traversal filters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraversalOptions {
    /// Drop nodes scoring below this value
    pub min_score: Option<f64>,

    /// Drop nodes the ego does not trust
    pub positive_only: bool,

    /// Frames deeper than this are kept but not expanded
    pub max_depth: usize,
}

impl Default for TraversalOptions {
    fn default() -> Self {
        Self {
            min_score: None,
            positive_only: true,
            max_depth: 2,
        }
    }
}

struct Frame {
    node: NodeId,
    parent: Option<usize>,
    depth: usize,
}

/// Raw traversal output: preorder edges plus typed node scores
pub(crate) fn traverse(
    access: &GraphAccess,
    ego: &NodeId,
    focus: &NodeId,
    options: &TraversalOptions,
) -> Result<(Vec<Edge>, NodeBuckets)> {
    let mut buckets = NodeBuckets::default();
    buckets.insert(focus.clone(), access.score(ego, focus)?);

    let mut arena = vec![Frame {
        node: focus.clone(),
        parent: None,
        depth: 0,
    }];
    let mut stack: Vec<(usize, Option<Edge>)> = vec![(0, None)];
    let mut edges = Vec::new();

    while let Some((idx, via)) = stack.pop() {
        if let Some(edge) = via {
            edges.push(edge);
        }

        if arena[idx].depth >= options.max_depth {
            continue;
        }

        let node = arena[idx].node.clone();
        let parent = arena[idx].parent.map(|p| arena[p].node.clone());
        let mut children = Vec::new();

        for edge in access.out_edges(&node) {
            let dest = &edge.dest;
            if dest == ego || Some(dest) == parent.as_ref() {
                continue;
            }

            let score = match access.score(ego, dest) {
                Ok(score) => score,
                Err(e) if e.is_not_found() => {
                    warn!(node = %dest, error = %e, "Skipping unscored node");
                    continue;
                }
                Err(e) => return Err(e),
            };

            if options.min_score.is_some_and(|min| score < min) {
                continue;
            }
            if options.positive_only && score <= 0.0 {
                continue;
            }
            if dest.kind() == NodeKind::Unknown {
                warn!(node = %dest, "Unknown node type");
                continue;
            }

            buckets.insert(dest.clone(), score);
            arena.push(Frame {
                node: dest.clone(),
                parent: Some(idx),
                depth: arena[idx].depth + 1,
            });
            children.push((arena.len() - 1, Some(edge)));
        }

        // Reverse so the first child is expanded first
        stack.extend(children.into_iter().rev());
    }

    debug!(ego = %ego, focus = %focus, frames = arena.len(), edges = edges.len(), "Traversal finished");
    Ok((edges, buckets))
}
