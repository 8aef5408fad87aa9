//! # Dice Game
//!
//! Session-locked ledger protocol for a two-dice over/under-seven wagering
//! game.
//!
//! Every wager runs under two independent guards: a TTL-bounded exclusion
//! lock keyed by client identity, and a row-locked transaction on the
//! client's wallet. The lock keeps two wagers for one client from
//! overlapping across connections; the row lock keeps balances correct even
//! if the lock is bypassed or expires early.
//!
//! ## Core Modules
//!
//! - [`wallet`]: Durable balances and the [`wallet::Ledger`] trait
//! - [`lock`]: Per-client exclusion lock and scoped acquisition
//! - [`game`]: Dice rolls and round resolution
//! - [`session`]: Per-connection protocol engine
//! - [`net`]: JSON wire messages
//! - [`db`]: PostgreSQL pool, schema and deadlines
//!
//! ## Example
//!
//! ```
//! use dice_game::game::{BetType, DiceRoll, Outcome, resolve};
//!
//! let round = resolve(BetType::Under, 50, DiceRoll::new(1, 3)).unwrap();
//! assert_eq!(round.outcome, Outcome::Win);
//! assert_eq!(round.winnings, 50);
//! ```

/// PostgreSQL connection pool, schema and query deadlines.
pub mod db;

/// Dice, bets and round resolution.
pub mod game;

/// Per-client exclusion lock.
pub mod lock;

/// Wire protocol messages.
pub mod net;

/// Per-connection session engine.
pub mod session;

/// Wallet ledger.
pub mod wallet;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;

pub use game::{BetType, Outcome, RoundResolver, SeededRoller};
pub use lock::{ExclusionLock, RedisLock};
pub use net::messages::{ClientRequest, ErrorCode, ServerMessage};
pub use session::{GameConfig, GameServices, Session, SessionState};
pub use wallet::{Ledger, WalletError, WalletManager};
