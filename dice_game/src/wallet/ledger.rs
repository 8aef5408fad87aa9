//! Ledger trait the session engine drives.
//!
//! [`super::WalletManager`] is the PostgreSQL implementation. Tests use the
//! in-memory ledger from `crate::mocks`.

use async_trait::async_trait;

use super::errors::WalletResult;

/// Durable per-client balances with atomic adjustment.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Create the wallet with the starting balance if it does not exist.
    /// Idempotent.
    async fn ensure_wallet(&self, client_id: &str) -> WalletResult<()>;

    /// Current balance.
    ///
    /// # Errors
    ///
    /// * `WalletError::WalletNotFound` - No wallet for this client
    async fn get_balance(&self, client_id: &str) -> WalletResult<i64>;

    /// Apply `delta` to the balance under a row lock and return the new
    /// balance. Nothing is written unless the whole adjustment commits.
    ///
    /// # Errors
    ///
    /// * `WalletError::InsufficientFunds` - `balance + delta` would be negative
    /// * `WalletError::WalletNotFound` - No wallet for this client
    async fn adjust_balance(&self, client_id: &str, delta: i64) -> WalletResult<i64>;
}
