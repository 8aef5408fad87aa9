//! PostgreSQL access: the pool, the wallet schema and query deadlines.
//!
//! The wallet ledger is the only relational state this crate owns. The pool
//! is shared by [`crate::wallet::WalletManager`] and the server's health check.

use log::info;
use sqlx::postgres::PgPool;

pub mod config;
pub mod timeouts;

pub use config::{DatabaseConfig, parse_env_or};
pub use timeouts::{
    DEFAULT_QUERY_TIMEOUT, DEFAULT_TRANSACTION_TIMEOUT, TimeoutError, TimeoutResult, with_timeout,
};

/// Wallet table definition.
///
/// The `CHECK` constraint makes the store itself refuse a negative balance,
/// independently of the check performed inside `adjust_balance`.
const WALLETS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS wallets (
    client_id  TEXT PRIMARY KEY,
    balance    BIGINT NOT NULL CHECK (balance >= 0),
    currency   TEXT NOT NULL,
    created_at TIMESTAMP NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMP NOT NULL DEFAULT NOW()
)
"#;

/// Connection pool for the wallet store
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Open a pool sized and timed by `config`
    ///
    /// ```no_run
    /// use dice_game::db::{Database, DatabaseConfig};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), sqlx::Error> {
    ///     let db = Database::new(&DatabaseConfig::development()).await?;
    ///     db.ensure_schema().await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = config.pool_options().connect(&config.database_url).await?;
        info!(
            "Database pool open ({}..={} connections)",
            config.min_connections, config.max_connections
        );
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the wallets table if it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(WALLETS_SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    /// Round-trip a trivial query
    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Wait for checked-out connections to return, then close the pool
    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires a running PostgreSQL instance (DATABASE_URL)"]
    async fn test_schema_refuses_negative_balance() {
        let mut config = DatabaseConfig::from_env();
        config.max_connections = 2;
        config.min_connections = 1;

        let db = Database::new(&config).await.unwrap();
        db.health_check().await.unwrap();
        db.ensure_schema().await.unwrap();
        // Idempotent
        db.ensure_schema().await.unwrap();

        let client = format!("schema_check_{}", rand::random::<u32>());
        let rejected = sqlx::query(
            "INSERT INTO wallets (client_id, balance, currency) VALUES ($1, -1, 'PTS')",
        )
        .bind(&client)
        .execute(db.pool())
        .await;
        assert!(rejected.is_err());

        db.close().await;
    }

    #[test]
    fn test_schema_is_idempotent_and_constrained() {
        assert!(WALLETS_SCHEMA.contains("CHECK (balance >= 0)"));
        assert!(WALLETS_SCHEMA.contains("IF NOT EXISTS"));
    }
}
