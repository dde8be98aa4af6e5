//! Error types for artsweep
//!
//! Centralized error handling using thiserror. Anything in this enum aborts
//! the run; per-item deletion failures never surface here, they become
//! `DeletionOutcome::Failed` instead.

use thiserror::Error;

/// All run-aborting errors
#[derive(Debug, Error)]
pub enum SweepError {
    /// Age expression was not `<positive integer><d|mo|y>`
    #[error("Invalid age expression '{expr}': {reason}")]
    InvalidAgeExpression { expr: String, reason: String },

    /// Exclusion document could not be read or parsed
    #[error("Failed to load exclusions from {source_name}: {reason}")]
    ExclusionLoad { source_name: String, reason: String },

    /// Candidate query failed after retries
    #[error("Query failed ({context}): {message}")]
    QueryExecution { context: String, message: String },

    /// Rejected configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SweepError {
    pub(crate) fn invalid_age(expr: &str, reason: impl Into<String>) -> Self {
        SweepError::InvalidAgeExpression {
            expr: expr.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn exclusion_load(source_name: impl Into<String>, reason: impl ToString) -> Self {
        SweepError::ExclusionLoad {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    /// True for errors raised while validating input, before any remote call
    pub fn is_setup_error(&self) -> bool {
        !matches!(self, SweepError::QueryExecution { .. })
    }
}

/// Result type alias for artsweep operations
pub type Result<T> = std::result::Result<T, SweepError>;
