//! Node and edge types of the signed social graph
//!
//! Every node identifier carries a one-character type tag:
//! - `U` user
//! - `B` beacon
//! - `C` comment
//!
//! The tag is validated once, when the identifier enters the system, and
//! kept next to the raw string so traversal rules never re-parse it.

use crate::errors::{GravityError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;

/// Node type, derived from the identifier prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// `U` prefix
    User,
    /// `B` prefix
    Beacon,
    /// `C` prefix
    Comment,
    /// Any other prefix; kept in the graph but never bucketed or traversed
    Unknown,
}

impl NodeKind {
    /// Classify a tag character
    pub fn from_tag(tag: char) -> Self {
        match tag {
            'U' => NodeKind::User,
            'B' => NodeKind::Beacon,
            'C' => NodeKind::Comment,
            _ => NodeKind::Unknown,
        }
    }

    /// Comments and beacons are folded into user-to-user edges by views
    pub fn is_pass_through(&self) -> bool {
        matches!(self, NodeKind::Comment | NodeKind::Beacon)
    }
}

/// Tagged node identifier
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId {
    raw: Arc<str>,
    kind: NodeKind,
}

impl NodeId {
    /// Validate and tag a raw identifier
    pub fn parse(raw: impl AsRef<str>) -> Result<Self> {
        let raw = raw.as_ref();
        let tag = raw.chars().next().ok_or_else(|| GravityError::InvalidNodeId {
            raw: raw.to_string(),
            reason: "empty identifier".to_string(),
        })?;

        Ok(Self {
            raw: Arc::from(raw),
            kind: NodeKind::from_tag(tag),
        })
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_user(&self) -> bool {
        self.kind == NodeKind::User
    }

    pub fn is_beacon(&self) -> bool {
        self.kind == NodeKind::Beacon
    }

    pub fn is_comment(&self) -> bool {
        self.kind == NodeKind::Comment
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.raw)
    }
}

impl FromStr for NodeId {
    type Err = GravityError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for NodeId {
    type Error = GravityError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl TryFrom<&str> for NodeId {
    type Error = GravityError;

    fn try_from(value: &str) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.raw.to_string()
    }
}

/// Signed, weighted directed edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub src: NodeId,
    pub dest: NodeId,
    pub weight: f64,
}

impl Edge {
    pub fn new(src: NodeId, dest: NodeId, weight: f64) -> Self {
        Self { src, dest, weight }
    }

    pub fn is_self_edge(&self) -> bool {
        self.src == self.dest
    }
}

/// Node scores grouped by node type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeBuckets {
    pub users: BTreeMap<NodeId, f64>,
    pub beacons: BTreeMap<NodeId, f64>,
    pub comments: BTreeMap<NodeId, f64>,
}

impl NodeBuckets {
    /// Put a scored node into its bucket; unknown kinds are logged and dropped
    pub fn insert(&mut self, node: NodeId, score: f64) {
        match node.kind() {
            NodeKind::User => {
                self.users.insert(node, score);
            }
            NodeKind::Beacon => {
                self.beacons.insert(node, score);
            }
            NodeKind::Comment => {
                self.comments.insert(node, score);
            }
            NodeKind::Unknown => {
                warn!(node = %node, "Unknown node type");
            }
        }
    }

    pub fn remove(&mut self, node: &NodeId) -> Option<f64> {
        match node.kind() {
            NodeKind::User => self.users.remove(node),
            NodeKind::Beacon => self.beacons.remove(node),
            NodeKind::Comment => self.comments.remove(node),
            NodeKind::Unknown => None,
        }
    }

    pub fn contains(&self, node: &NodeId) -> bool {
        self.users.contains_key(node)
            || self.beacons.contains_key(node)
            || self.comments.contains_key(node)
    }

    pub fn len(&self) -> usize {
        self.users.len() + self.beacons.len() + self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<(NodeId, f64)> for NodeBuckets {
    fn from_iter<I: IntoIterator<Item = (NodeId, f64)>>(iter: I) -> Self {
        let mut buckets = NodeBuckets::default();
        for (node, score) in iter {
            buckets.insert(node, score);
        }
        buckets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_prefix() {
        assert_eq!(NodeId::parse("U1").unwrap().kind(), NodeKind::User);
        assert_eq!(NodeId::parse("B42").unwrap().kind(), NodeKind::Beacon);
        assert_eq!(NodeId::parse("CU1").unwrap().kind(), NodeKind::Comment);
        assert_eq!(NodeId::parse("a").unwrap().kind(), NodeKind::Unknown);
    }

    #[test]
    fn test_empty_id_rejected() {
        let err = NodeId::parse("").unwrap_err();
        assert!(matches!(err, GravityError::InvalidNodeId { .. }));
    }

    #[test]
    fn test_serde_as_plain_string() {
        let id = NodeId::parse("B7").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"B7\"");

        let back: NodeId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(back.is_beacon());

        assert!(serde_json::from_str::<NodeId>("\"\"").is_err());
    }

    #[test]
    fn test_buckets_skip_unknown() {
        let buckets: NodeBuckets = [
            (NodeId::parse("U1").unwrap(), 0.5),
            (NodeId::parse("B1").unwrap(), 0.2),
            (NodeId::parse("C1").unwrap(), 0.1),
            (NodeId::parse("x1").unwrap(), 0.9),
        ]
        .into_iter()
        .collect();

        assert_eq!(buckets.len(), 3);
        assert!(!buckets.contains(&NodeId::parse("x1").unwrap()));
    }
}
