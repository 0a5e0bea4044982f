//! Error types for the purge engine.

use docpurge_store::StoreError;
use thiserror::Error;

use crate::policy::PolicyError;

/// Result type for engine operations.
pub type PurgeResult<T> = Result<T, PurgeError>;

/// Errors that abort a purge run.
#[derive(Error, Debug)]
pub enum PurgeError {
    /// A store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The purge policy raised an error while evaluating a group.
    #[error("purge policy failed: {0}")]
    Policy(#[from] PolicyError),
}
