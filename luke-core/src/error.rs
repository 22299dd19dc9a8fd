//! Error types for canvas model operations.

use thiserror::Error;

/// Result type for canvas model operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in canvas model operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An element violates a model invariant.
    #[error("Invalid element '{id}': {reason}")]
    InvalidElement {
        /// Identifier of the offending element (may be empty).
        id: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Document serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
