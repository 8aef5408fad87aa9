//! Deadlines for ledger queries.
//!
//! An expired deadline is an ordinary storage failure: the caller gets an
//! error naming the operation, never a call left pending.

use log::warn;
use std::{future::Future, time::Duration};

/// Default timeout for single-statement queries (3 seconds)
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(3);

/// Default timeout for balance-adjusting transactions (5 seconds)
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(5);

/// A deadline-bounded query that failed or ran out of time
#[derive(Debug, thiserror::Error)]
pub enum TimeoutError {
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type TimeoutResult<T> = Result<T, TimeoutError>;

/// Run `query` with a deadline of `limit`, labelled `operation` in logs.
///
/// On expiry the future is dropped; for a transaction that drops the
/// `sqlx::Transaction`, which rolls it back.
///
/// # Example
///
/// ```no_run
/// use dice_game::db::timeouts::{with_timeout, DEFAULT_QUERY_TIMEOUT};
/// # use sqlx::PgPool;
/// # async fn example(pool: &PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let row = with_timeout(
///     "balance read",
///     DEFAULT_QUERY_TIMEOUT,
///     sqlx::query("SELECT balance FROM wallets WHERE client_id = $1")
///         .bind("alice")
///         .fetch_optional(pool),
/// )
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn with_timeout<F, T>(operation: &'static str, limit: Duration, query: F) -> TimeoutResult<T>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(limit, query).await {
        Ok(result) => Ok(result?),
        Err(_) => {
            warn!("{} exceeded its {:?} deadline", operation, limit);
            Err(TimeoutError::Timeout {
                operation,
                after: limit,
            })
        }
    }
}
