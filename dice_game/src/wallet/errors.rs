//! Wallet error types.

use crate::db::TimeoutError;
use std::time::Duration;
use thiserror::Error;

/// Wallet errors
#[derive(Debug, Error)]
pub enum WalletError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Applying the adjustment would make the balance negative
    #[error("Insufficient funds: available {available}, required {required}")]
    InsufficientFunds { available: i64, required: i64 },

    /// Wallet not found
    #[error("Wallet not found for client {0}")]
    WalletNotFound(String),

    /// Adjustment would overflow the balance column
    #[error("Balance overflow")]
    BalanceOverflow,

    /// The balance update touched an unexpected number of rows
    #[error("Balance update affected {0} rows, expected 1")]
    UpdateFailed(u64),

    /// Operation exceeded its deadline and was rolled back
    #[error("Wallet operation timed out after {0:?}")]
    Timeout(Duration),
}

impl From<TimeoutError> for WalletError {
    fn from(err: TimeoutError) -> Self {
        match err {
            TimeoutError::Timeout { after, .. } => WalletError::Timeout(after),
            TimeoutError::Database(e) => WalletError::Database(e),
        }
    }
}

/// Result type for wallet operations
pub type WalletResult<T> = Result<T, WalletError>;
