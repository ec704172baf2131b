//! Predicate pushdown queries
//!
//! A query is an unordered list of `(field, operator, value)` quals plus
//! the requested columns. Only equality on `src` and `dest` is supported;
//! `src` is always evaluated before `dest`.

use gravity_common::errors::{GravityError, Result};
use gravity_common::{GraphAccess, NodeId};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const SRC: &str = "src";
pub const DEST: &str = "dest";
pub const WEIGHT: &str = "weight";

/// One equality predicate, carried on the wire as a 3-tuple
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String, String)", into = "(String, String, String)")]
pub struct Qual {
    pub field: String,
    pub operator: String,
    pub value: String,
}

impl Qual {
    pub fn new(field: impl Into<String>, operator: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }

    fn order(&self) -> usize {
        match self.field.as_str() {
            SRC => 0,
            DEST => 1,
            WEIGHT => 2,
            _ => usize::MAX,
        }
    }
}

impl From<(String, String, String)> for Qual {
    fn from((field, operator, value): (String, String, String)) -> Self {
        Self { field, operator, value }
    }
}

impl From<Qual> for (String, String, String) {
    fn from(qual: Qual) -> Self {
        (qual.field, qual.operator, qual.value)
    }
}

/// Request payload: `[quals, columns]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub quals: Vec<Qual>,
    pub columns: Vec<String>,
}

/// Result row: `(src, dest, score)`
pub type Row = (String, String, f64);

/// Stable sort putting `src` first, then `dest`, then `weight`, then the rest
pub fn sort_quals(quals: &mut [Qual]) {
    quals.sort_by_key(Qual::order);
}

/// Evaluates queries against the graph
#[derive(Clone)]
pub struct FdwProcessor {
    access: GraphAccess,
}

impl FdwProcessor {
    pub fn new(access: GraphAccess) -> Self {
        Self { access }
    }

    /// Rows for one query
    ///
    /// With a `dest` qual the single `(src, dest, score)` row; otherwise one
    /// row per ranked node of `src`.
    pub fn process_query(&self, mut quals: Vec<Qual>, columns: &[String]) -> Result<Vec<Row>> {
        sort_quals(&mut quals);

        let mut ego: Option<String> = None;
        let mut dest: Option<String> = None;
        for qual in quals {
            match (qual.field.as_str(), qual.operator.as_str()) {
                (SRC, "=") => ego = Some(qual.value),
                (DEST, "=") => dest = Some(qual.value),
                _ => return Err(GravityError::UnknownField { field: qual.field }),
            }
        }

        let ego = ego.ok_or(GravityError::NoSourceNode)?;
        debug!(ego = %ego, dest = ?dest, columns = ?columns, "Processing query");
        let ego_id = NodeId::parse(&ego)?;

        match dest {
            Some(dest) => {
                let score = self.access.score(&ego_id, &NodeId::parse(&dest)?)?;
                Ok(vec![(ego, dest, score)])
            }
            None => Ok(self
                .access
                .ranks(&ego_id, None)?
                .into_iter()
                .map(|(node, score)| (ego.clone(), node.to_string(), score))
                .collect()),
        }
    }

    /// Evaluate a decoded request
    pub fn handle(&self, request: QueryRequest) -> Result<Vec<Row>> {
        self.process_query(request.quals, &request.columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gravity_common::MemoryRankEngine;
    use std::sync::Arc;

    fn processor() -> (GraphAccess, FdwProcessor) {
        let access = GraphAccess::from(Arc::new(MemoryRankEngine::default()));
        access.add_edge(&NodeId::parse("a").unwrap(), &NodeId::parse("b").unwrap(), 1.0);
        (access.clone(), FdwProcessor::new(access))
    }

    fn columns() -> Vec<String> {
        vec!["src".into(), "dest".into(), "weight".into()]
    }

    #[test]
    fn test_sort_quals() {
        let mut quals = vec![
            Qual::new("other", "=", "x"),
            Qual::new("dest", "=", "b"),
            Qual::new("weight", ">", "0"),
            Qual::new("src", "=", "a"),
        ];
        sort_quals(&mut quals);

        let fields: Vec<&str> = quals.iter().map(|q| q.field.as_str()).collect();
        assert_eq!(fields, vec!["src", "dest", "weight", "other"]);
    }

    #[test]
    fn test_process_query() {
        let (access, processor) = processor();
        let a = NodeId::parse("a").unwrap();
        let b = NodeId::parse("b").unwrap();

        let rows = processor
            .process_query(vec![Qual::new("dest", "=", "b"), Qual::new("src", "=", "a")], &columns())
            .unwrap();

        assert_eq!(rows, vec![("a".to_string(), "b".to_string(), access.score(&a, &b).unwrap())]);
    }

    #[test]
    fn test_process_query_no_dest() {
        let (access, processor) = processor();
        let a = NodeId::parse("a").unwrap();

        let rows = processor.process_query(vec![Qual::new("src", "=", "a")], &columns()).unwrap();
        let expected: Vec<Row> = access
            .ranks(&a, None)
            .unwrap()
            .into_iter()
            .map(|(node, score)| ("a".to_string(), node.to_string(), score))
            .collect();

        assert_eq!(rows, expected);
        assert!(!rows.is_empty());
    }

    #[test]
    fn test_process_query_unknown_field() {
        let (_, processor) = processor();
        let quals = vec![
            Qual::new("src", "=", "a"),
            Qual::new("dest", "=", "b"),
            Qual::new("unknown", "=", "c"),
        ];

        let err = processor.process_query(quals, &columns()).unwrap_err();
        assert_eq!(err.to_string(), "Unknown field: unknown");
    }

    #[test]
    fn test_unsupported_operator() {
        let (_, processor) = processor();

        let err = processor.process_query(vec![Qual::new("src", "<", "a")], &columns()).unwrap_err();
        assert_eq!(err.to_string(), "Unknown field: src");
    }

    #[test]
    fn test_process_query_no_source() {
        let (_, processor) = processor();

        let err = processor.process_query(vec![Qual::new("dest", "=", "b")], &columns()).unwrap_err();
        assert_eq!(err.to_string(), "No source node specified");
    }

    #[test]
    fn test_unknown_node() {
        let (_, processor) = processor();

        let err = processor
            .process_query(vec![Qual::new("src", "=", "a"), Qual::new("dest", "=", "zz")], &columns())
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
