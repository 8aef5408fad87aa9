//! Wallet module: the durable, single-writer ledger of client balances.
//!
//! This module implements:
//! - Lazy wallet creation with a configured starting balance
//! - Row-locked (`SELECT ... FOR UPDATE`) balance adjustment
//! - A non-negativity invariant checked before commit and enforced by the schema
//!
//! ## Example
//!
//! ```no_run
//! use dice_game::wallet::WalletManager;
//! use dice_game::db::Database;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(&Default::default()).await?;
//!     let wallet = WalletManager::new(Arc::new(db.pool().clone()), 500);
//!
//!     wallet.ensure_wallet("alice").await?;
//!     let new_balance = wallet.adjust_balance("alice", -50).await?;
//!     println!("New balance after bet: {}", new_balance);
//!
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod ledger;
pub mod manager;
pub mod models;

pub use errors::{WalletError, WalletResult};
pub use ledger::Ledger;
pub use manager::WalletManager;
pub use models::{ClientId, DEFAULT_CURRENCY, DEFAULT_STARTING_BALANCE, Wallet};
