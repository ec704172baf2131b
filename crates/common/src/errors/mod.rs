//! Error types for Gravity services
//!
//! Provides a single error enum shared by every crate with:
//! - Distinct variants for each rank engine failure mode
//! - Machine-readable error codes for the outer API layer
//! - Conversions from the database, codec and IO layers

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using GravityError
pub type Result<T> = std::result::Result<T, GravityError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    InvalidNodeId,
    UnknownField,
    MissingSource,

    // Rank engine errors (4xxx)
    NodeNotFound,
    EgoNotInitialized,
    EmptyScoreCounter,
    NoPathFound,

    // Database errors (7xxx)
    DatabaseError,

    // Protocol errors (8xxx)
    ProtocolError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
    Cancelled,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::InvalidNodeId => 1001,
            ErrorCode::UnknownField => 1002,
            ErrorCode::MissingSource => 1003,

            ErrorCode::NodeNotFound => 4001,
            ErrorCode::EgoNotInitialized => 4002,
            ErrorCode::EmptyScoreCounter => 4003,
            ErrorCode::NoPathFound => 4004,

            ErrorCode::DatabaseError => 7001,

            ErrorCode::ProtocolError => 8001,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
            ErrorCode::Cancelled => 9004,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum GravityError {
    // Validation errors
    #[error("Invalid node id {raw:?}: {reason}")]
    InvalidNodeId { raw: String, reason: String },

    #[error("Unknown field: {field}")]
    UnknownField { field: String },

    #[error("No source node specified")]
    NoSourceNode,

    // Rank engine errors
    #[error("Node does not exist: {node}")]
    NodeNotFound { node: String },

    #[error("Ego was not initialized before: {ego}")]
    EgoNotInitialized { ego: String },

    #[error("Score counter empty for ego {ego}")]
    EmptyScoreCounter { ego: String },

    #[error("No path from {from} to {to}")]
    NoPathFound { from: String, to: String },

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    // Protocol errors
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("MessagePack decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("MessagePack encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    // Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Operation cancelled")]
    Cancelled,

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl GravityError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            GravityError::InvalidNodeId { .. } => ErrorCode::InvalidNodeId,
            GravityError::UnknownField { .. } => ErrorCode::UnknownField,
            GravityError::NoSourceNode => ErrorCode::MissingSource,
            GravityError::NodeNotFound { .. } => ErrorCode::NodeNotFound,
            GravityError::EgoNotInitialized { .. } => ErrorCode::EgoNotInitialized,
            GravityError::EmptyScoreCounter { .. } => ErrorCode::EmptyScoreCounter,
            GravityError::NoPathFound { .. } => ErrorCode::NoPathFound,
            GravityError::Database(_) => ErrorCode::DatabaseError,
            GravityError::Protocol { .. } => ErrorCode::ProtocolError,
            GravityError::Decode(_) | GravityError::Encode(_) => ErrorCode::ProtocolError,
            GravityError::Internal { .. } => ErrorCode::InternalError,
            GravityError::Configuration { .. } => ErrorCode::ConfigurationError,
            GravityError::Serialization(_) => ErrorCode::SerializationError,
            GravityError::Cancelled => ErrorCode::Cancelled,
            GravityError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Shorthand for a missing node
    pub fn not_found(node: impl ToString) -> Self {
        GravityError::NodeNotFound { node: node.to_string() }
    }

    /// True when the rank engine does not know the node
    pub fn is_not_found(&self) -> bool {
        matches!(self, GravityError::NodeNotFound { .. })
    }

    /// Errors caused by the caller's input rather than the service state
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            GravityError::InvalidNodeId { .. }
                | GravityError::UnknownField { .. }
                | GravityError::NoSourceNode
                | GravityError::NodeNotFound { .. }
                | GravityError::EgoNotInitialized { .. }
                | GravityError::EmptyScoreCounter { .. }
                | GravityError::Protocol { .. }
                | GravityError::Decode(_)
        )
    }
}

impl From<std::io::Error> for GravityError {
    fn from(err: std::io::Error) -> Self {
        GravityError::Internal {
            message: err.to_string()
        }
    }
}

impl From<config::ConfigError> for GravityError {
    fn from(err: config::ConfigError) -> Self {
        GravityError::Configuration {
            message: err.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = GravityError::not_found("U1");
        assert_eq!(err.code(), ErrorCode::NodeNotFound);
        assert_eq!(err.code().as_code(), 4001);
        assert!(err.is_not_found());
    }

    #[test]
    fn test_engine_errors_are_distinguishable() {
        let not_init = GravityError::EgoNotInitialized { ego: "U1".into() };
        let empty = GravityError::EmptyScoreCounter { ego: "U1".into() };

        assert_ne!(not_init.code(), empty.code());
        assert!(!not_init.is_not_found());
        assert!(!empty.is_not_found());
    }

    #[test]
    fn test_query_messages() {
        let err = GravityError::UnknownField { field: "unknown".into() };
        assert_eq!(err.to_string(), "Unknown field: unknown");
        assert_eq!(GravityError::NoSourceNode.to_string(), "No source node specified");
        assert!(err.is_client_error());
    }

    #[test]
    fn test_server_error() {
        let err = GravityError::Internal {
            message: "Something went wrong".into()
        };
        assert_eq!(err.code(), ErrorCode::InternalError);
        assert!(!err.is_client_error());
    }
}
