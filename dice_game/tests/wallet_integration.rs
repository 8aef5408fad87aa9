//! Integration tests for the PostgreSQL wallet ledger.
//!
//! Require a running database; run with `cargo test -- --ignored` and
//! `DATABASE_URL` pointing at a scratch database.

use dice_game::db::{Database, DatabaseConfig};
use dice_game::wallet::{DEFAULT_CURRENCY, Ledger, WalletError, WalletManager};
use serial_test::serial;
use sqlx::PgPool;
use std::sync::Arc;

/// Generate a client id no other test run will share
fn unique_client(prefix: &str) -> String {
    format!(
        "{}_{}",
        prefix,
        chrono::Utc::now().timestamp_nanos_opt().unwrap()
    )
}

/// Helper to create a test database pool with the wallet schema
async fn setup_test_db() -> Arc<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://postgres@localhost/dice_game_test".to_string());

    let config = DatabaseConfig {
        database_url,
        max_connections: 10,
        min_connections: 1,
        connection_timeout_secs: 5,
        idle_timeout_secs: 300,
        max_lifetime_secs: 1800,
    };

    let db = Database::new(&config)
        .await
        .expect("Failed to create test database");
    db.ensure_schema().await.expect("Failed to create schema");

    Arc::new(db.pool().clone())
}

/// Helper to remove a test wallet
async fn cleanup_wallet(pool: &PgPool, client_id: &str) {
    let _ = sqlx::query("DELETE FROM wallets WHERE client_id = $1")
        .bind(client_id)
        .execute(pool)
        .await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_ensure_wallet_is_idempotent() {
    let pool = setup_test_db().await;
    let manager = WalletManager::new(pool.clone(), 500);
    let client = unique_client("ensure");

    manager.ensure_wallet(&client).await.unwrap();
    manager.adjust_balance(&client, -100).await.unwrap();
    manager.ensure_wallet(&client).await.unwrap();

    let wallet = manager.get_wallet(&client).await.unwrap();
    assert_eq!(wallet.balance, 400);
    assert_eq!(wallet.currency, DEFAULT_CURRENCY);

    cleanup_wallet(&pool, &client).await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_missing_wallet_is_not_found() {
    let pool = setup_test_db().await;
    let manager = WalletManager::new(pool, 500);
    let client = unique_client("missing");

    assert!(matches!(
        manager.get_balance(&client).await,
        Err(WalletError::WalletNotFound(_))
    ));
    assert!(matches!(
        manager.adjust_balance(&client, 10).await,
        Err(WalletError::WalletNotFound(_))
    ));
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_overdraft_is_rejected_without_mutation() {
    let pool = setup_test_db().await;
    let manager = WalletManager::new(pool.clone(), 10);
    let client = unique_client("overdraft");
    manager.ensure_wallet(&client).await.unwrap();

    let err = manager.adjust_balance(&client, -50).await.unwrap_err();
    assert!(matches!(
        err,
        WalletError::InsufficientFunds {
            available: 10,
            required: 50
        }
    ));
    assert_eq!(manager.get_balance(&client).await.unwrap(), 10);

    // Draining to exactly zero is allowed
    assert_eq!(manager.adjust_balance(&client, -10).await.unwrap(), 0);

    cleanup_wallet(&pool, &client).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires PostgreSQL"]
#[serial]
async fn test_concurrent_adjustments_serialize_on_row_lock() {
    let pool = setup_test_db().await;
    let manager = Arc::new(WalletManager::new(pool.clone(), 500));
    let client = unique_client("row_lock");
    manager.ensure_wallet(&client).await.unwrap();

    // 20 debits of 30 against 500: exactly 16 can succeed
    let mut handles = Vec::new();
    for _ in 0..20 {
        let manager = manager.clone();
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            manager.adjust_balance(&client, -30).await
        }));
    }

    let mut succeeded = 0;
    let mut refused = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(balance) => {
                assert!(balance >= 0);
                succeeded += 1;
            }
            Err(WalletError::InsufficientFunds { .. }) => refused += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(succeeded, 16);
    assert_eq!(refused, 4);
    assert_eq!(manager.get_balance(&client).await.unwrap(), 20);

    cleanup_wallet(&pool, &client).await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_ledger_trait_object() {
    let pool = setup_test_db().await;
    let ledger: Arc<dyn Ledger> = Arc::new(WalletManager::with_default_balance(pool.clone()));
    let client = unique_client("trait");

    ledger.ensure_wallet(&client).await.unwrap();
    assert_eq!(ledger.adjust_balance(&client, 25).await.unwrap(), 525);
    assert_eq!(ledger.get_balance(&client).await.unwrap(), 525);

    cleanup_wallet(&pool, &client).await;
}
