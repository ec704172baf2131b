//! Transitive bridge deduplication
//!
//! Works on a flat edge list in depth-first emission order, where a bridge
//! through a comment always shows up as two consecutive edges
//! `entry -> C` and `C -> exit`. Only the first bridge per
//! `(entry, exit)` pair survives; comments that lead nowhere are dropped.

use gravity_common::{Edge, NodeBuckets, NodeId};
use std::collections::HashSet;
use tracing::trace;

/// Drop duplicate and dead-end comment bridges
pub fn dedup_transitive(edges: Vec<Edge>, mut buckets: NodeBuckets) -> (Vec<Edge>, NodeBuckets) {
    let mut seen: HashSet<(NodeId, NodeId)> = HashSet::new();
    let mut kept = Vec::with_capacity(edges.len());
    let mut i = 0;

    while i < edges.len() {
        let edge = &edges[i];

        if edge.dest.is_comment() {
            match edges.get(i + 1) {
                // Trailing comment edge
                None => {
                    trace!(comment = %edge.dest, "Dropping trailing comment");
                    buckets.remove(&edge.dest);
                    i += 1;
                    continue;
                }
                // Dead end
                Some(next) if next.src != edge.dest => {
                    trace!(comment = %edge.dest, "Dropping dead-end comment");
                    buckets.remove(&edge.dest);
                    i += 1;
                    continue;
                }
                Some(next) => {
                    if !seen.insert((edge.src.clone(), next.dest.clone())) {
                        trace!(comment = %edge.dest, "Dropping duplicate bridge");
                        buckets.remove(&edge.dest);
                        i += 2;
                        continue;
                    }
                }
            }
        }

        kept.push(edge.clone());
        i += 1;
    }

    (kept, buckets)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(raw: &str) -> NodeId {
        NodeId::parse(raw).unwrap()
    }

    fn edge(src: &str, dest: &str) -> Edge {
        Edge::new(n(src), n(dest), 1.0)
    }

    fn buckets(nodes: &[&str]) -> NodeBuckets {
        nodes.iter().map(|raw| (n(raw), 1.0)).collect()
    }

    #[test]
    fn test_duplicate_bridge_collapsed() {
        let edges = vec![
            edge("U1", "Cfoo"),
            edge("Cfoo", "U2"),
            edge("U1", "Cbar"),
            edge("Cbar", "U2"),
        ];

        let (edges, nodes) = dedup_transitive(edges, buckets(&["U1", "U2", "Cfoo", "Cbar"]));

        assert_eq!(edges, vec![edge("U1", "Cfoo"), edge("Cfoo", "U2")]);
        assert!(nodes.contains(&n("Cfoo")));
        assert!(!nodes.contains(&n("Cbar")));
    }

    #[test]
    fn test_trailing_comment_dropped() {
        let edges = vec![edge("U1", "U2"), edge("U2", "C1")];

        let (edges, nodes) = dedup_transitive(edges, buckets(&["U1", "U2", "C1"]));

        assert_eq!(edges, vec![edge("U1", "U2")]);
        assert!(!nodes.contains(&n("C1")));
    }

    #[test]
    fn test_dead_end_comment_dropped() {
        let edges = vec![edge("U1", "C1"), edge("U1", "U2")];

        let (edges, nodes) = dedup_transitive(edges, buckets(&["U1", "U2", "C1"]));

        assert_eq!(edges, vec![edge("U1", "U2")]);
        assert!(!nodes.contains(&n("C1")));
        assert_eq!(nodes.len(), 2);
    }

    #[test]
    fn test_distinct_bridges_kept() {
        let edges = vec![
            edge("U1", "C1"),
            edge("C1", "U2"),
            edge("U1", "C2"),
            edge("C2", "U3"),
        ];

        let (kept, _) = dedup_transitive(edges.clone(), NodeBuckets::default());
        assert_eq!(kept, edges);
    }
}
