//! Gravity FDW
//!
//! Out-of-process predicate pushdown over the rank engine:
//! - Qual normalization and evaluation
//! - Length-prefixed MessagePack framing
//! - Sequential query listener

pub mod codec;
pub mod listener;
pub mod protocol;

pub use listener::{Acceptor, QueryListener, DEFAULT_ADDR};
pub use protocol::{sort_quals, FdwProcessor, Qual, QueryRequest, Row};
