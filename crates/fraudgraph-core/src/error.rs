//! Centralized error types for FraudGraph.

use std::time::Duration;
use thiserror::Error;

/// Main error type for FraudGraph operations.
#[derive(Error, Debug)]
pub enum FraudError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    Conflict(String),

    #[error("Graph query failed: {0}")]
    Query(String),

    #[error("Graph query '{operation}' timed out after {}s", .after.as_secs())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("Clustering error: {0}")]
    Clustering(#[from] ClusterError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for FraudGraph operations.
pub type FraudResult<T> = Result<T, FraudError>;

impl FraudError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a not found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Create a conflict error.
    pub fn conflict(what: impl Into<String>) -> Self {
        Self::Conflict(what.into())
    }

    /// Create a query error.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Whether a caller may reasonably retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Clustering(ClusterError::Timeout(_))
        )
    }
}

/// Failure of the external clustering collaborator.
#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("clustering service unavailable: {0}")]
    Unavailable(String),

    #[error("clustering service timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("clustering service returned an invalid response: {0}")]
    InvalidResponse(String),
}
