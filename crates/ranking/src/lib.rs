//! Gravity Ranking
//!
//! Derived, trust-weighted views of the signed social graph:
//! - Gravity views around a focus node, with stitched ego paths
//! - Depth-first traversal views with transitive bridge dedup
//! - TTL-cached global beacon ranking
//! - Zero node maintenance and startup warmup

pub mod global;
pub mod graph;
pub mod gravity;
pub mod maintenance;
pub mod stitcher;

pub use global::GlobalRankCache;
pub use graph::{GraphAlgorithms, PetgraphAlgorithms, WeightedGraph};
pub use gravity::{GravityView, GravityViewBuilder, TraversalOptions, TraversalView, ViewOptions};
pub use maintenance::{warmup, WarmupReport, ZeroOpinionMaintainer};
pub use stitcher::{merge_hop_weights, PathStitcher};
