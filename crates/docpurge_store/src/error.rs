//! Error types for store operations.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur when talking to a document store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A write conflicted with an existing revision (HTTP 409).
    #[error("write conflict: {0}")]
    Conflict(String),

    /// The requested database or document does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Network or transport failure.
    #[error("transport error: {message}")]
    Transport {
        /// Error message from the underlying client.
        message: String,
    },

    /// The store returned a response the engine could not interpret.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl StoreError {
    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Returns true if this error is a write conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}
