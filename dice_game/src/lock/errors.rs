//! Exclusion lock error types.

use std::time::Duration;
use thiserror::Error;

/// Lock store errors
#[derive(Debug, Error)]
pub enum LockError {
    /// Lock store command failed
    #[error("Lock store error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Lock store did not answer before the deadline
    #[error("Lock store operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Result type for lock operations
pub type LockResult<T> = Result<T, LockError>;
