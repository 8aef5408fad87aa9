//! PostgreSQL-backed wallet manager.
#![allow(clippy::needless_raw_string_hashes)]

use super::{
    errors::{WalletError, WalletResult},
    ledger::Ledger,
    models::{DEFAULT_CURRENCY, DEFAULT_STARTING_BALANCE, Wallet},
};
use crate::db::timeouts::{DEFAULT_QUERY_TIMEOUT, DEFAULT_TRANSACTION_TIMEOUT, with_timeout};
use async_trait::async_trait;
use log::{debug, info, warn};
use sqlx::{PgPool, Row};
use std::{sync::Arc, time::Duration};

/// Wallet manager
#[derive(Clone)]
pub struct WalletManager {
    pool: Arc<PgPool>,
    starting_balance: i64,
    query_timeout: Duration,
    transaction_timeout: Duration,
}

impl WalletManager {
    /// Create a new wallet manager
    ///
    /// # Arguments
    ///
    /// * `pool` - Database connection pool
    /// * `starting_balance` - Balance given to a wallet created on first use
    pub fn new(pool: Arc<PgPool>, starting_balance: i64) -> Self {
        Self {
            pool,
            starting_balance,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            transaction_timeout: DEFAULT_TRANSACTION_TIMEOUT,
        }
    }

    /// Create a wallet manager with the default starting balance
    pub fn with_default_balance(pool: Arc<PgPool>) -> Self {
        Self::new(pool, DEFAULT_STARTING_BALANCE)
    }

    /// Override the per-operation deadlines
    pub fn with_timeouts(mut self, query: Duration, transaction: Duration) -> Self {
        self.query_timeout = query;
        self.transaction_timeout = transaction;
        self
    }

    /// Balance a newly created wallet receives
    pub fn starting_balance(&self) -> i64 {
        self.starting_balance
    }

    /// Create the wallet for `client_id` unless it already exists
    pub async fn ensure_wallet(&self, client_id: &str) -> WalletResult<()> {
        let result = with_timeout(
            "wallet insert",
            self.query_timeout,
            sqlx::query(
                r#"
                INSERT INTO wallets (client_id, balance, currency, created_at, updated_at)
                VALUES ($1, $2, $3, NOW(), NOW())
                ON CONFLICT (client_id) DO NOTHING
                "#,
            )
            .bind(client_id)
            .bind(self.starting_balance)
            .bind(DEFAULT_CURRENCY)
            .execute(self.pool.as_ref()),
        )
        .await?;

        if result.rows_affected() == 1 {
            info!(
                "Created wallet for client {} with balance {}",
                client_id, self.starting_balance
            );
        }
        Ok(())
    }

    /// Get the full wallet record for a client
    ///
    /// # Returns
    ///
    /// * `WalletResult<Wallet>` - Wallet information or error
    pub async fn get_wallet(&self, client_id: &str) -> WalletResult<Wallet> {
        let row = with_timeout(
            "wallet read",
            self.query_timeout,
            sqlx::query(
                r#"
                SELECT client_id, balance, currency, created_at, updated_at
                FROM wallets
                WHERE client_id = $1
                "#,
            )
            .bind(client_id)
            .fetch_optional(self.pool.as_ref()),
        )
        .await?
        .ok_or_else(|| WalletError::WalletNotFound(client_id.to_string()))?;

        Ok(Wallet {
            client_id: row.get("client_id"),
            balance: row.get("balance"),
            currency: row.get("currency"),
            created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
            updated_at: row.get::<chrono::NaiveDateTime, _>("updated_at").and_utc(),
        })
    }

    /// Get the current balance for a client
    pub async fn get_balance(&self, client_id: &str) -> WalletResult<i64> {
        let row = with_timeout(
            "balance read",
            self.query_timeout,
            sqlx::query("SELECT balance FROM wallets WHERE client_id = $1")
                .bind(client_id)
                .fetch_optional(self.pool.as_ref()),
        )
        .await?
        .ok_or_else(|| WalletError::WalletNotFound(client_id.to_string()))?;

        Ok(row.get("balance"))
    }

    /// Apply `delta` to a wallet balance inside a row-locked transaction
    ///
    /// The wallet row is held with `FOR UPDATE` until commit, so concurrent
    /// adjustments for the same client serialize in the database even when
    /// the distributed lock is bypassed.
    ///
    /// # Returns
    ///
    /// * `WalletResult<i64>` - New wallet balance or error
    ///
    /// # Errors
    ///
    /// * `WalletError::InsufficientFunds` - Balance would become negative
    /// * `WalletError::WalletNotFound` - No wallet row for the client
    /// * `WalletError::Timeout` - Deadline passed; the transaction was rolled back
    pub async fn adjust_balance(&self, client_id: &str, delta: i64) -> WalletResult<i64> {
        match tokio::time::timeout(
            self.transaction_timeout,
            self.adjust_in_transaction(client_id, delta),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "Balance adjustment for client {} timed out after {:?}",
                    client_id, self.transaction_timeout
                );
                Err(WalletError::Timeout(self.transaction_timeout))
            }
        }
    }

    async fn adjust_in_transaction(&self, client_id: &str, delta: i64) -> WalletResult<i64> {
        // Dropping `tx` without commit rolls back.
        let mut tx = self.pool.begin().await?;

        let current_balance: i64 =
            sqlx::query("SELECT balance FROM wallets WHERE client_id = $1 FOR UPDATE")
                .bind(client_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| WalletError::WalletNotFound(client_id.to_string()))?
                .get("balance");

        let new_balance = current_balance
            .checked_add(delta)
            .ok_or(WalletError::BalanceOverflow)?;

        if new_balance < 0 {
            debug!(
                "Insufficient funds for client {} (current: {}, change: {})",
                client_id, current_balance, delta
            );
            return Err(WalletError::InsufficientFunds {
                available: current_balance,
                required: delta.saturating_neg(),
            });
        }

        let result = sqlx::query(
            "UPDATE wallets
             SET balance = $1, updated_at = NOW()
             WHERE client_id = $2",
        )
        .bind(new_balance)
        .bind(client_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() != 1 {
            return Err(WalletError::UpdateFailed(result.rows_affected()));
        }

        tx.commit().await?;

        debug!(
            "Client {} balance adjusted by {} to {}",
            client_id, delta, new_balance
        );
        Ok(new_balance)
    }
}

#[async_trait]
impl Ledger for WalletManager {
    async fn ensure_wallet(&self, client_id: &str) -> WalletResult<()> {
        WalletManager::ensure_wallet(self, client_id).await
    }

    async fn get_balance(&self, client_id: &str) -> WalletResult<i64> {
        WalletManager::get_balance(self, client_id).await
    }

    async fn adjust_balance(&self, client_id: &str, delta: i64) -> WalletResult<i64> {
        WalletManager::adjust_balance(self, client_id, delta).await
    }
}
