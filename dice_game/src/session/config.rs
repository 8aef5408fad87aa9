use std::time::Duration;

use crate::{
    db::{DEFAULT_QUERY_TIMEOUT, DEFAULT_TRANSACTION_TIMEOUT},
    lock::{DEFAULT_LOCK_OP_TIMEOUT, DEFAULT_LOCK_TTL},
    wallet::DEFAULT_STARTING_BALANCE,
};

/// Default upper bound on a single wager
pub const DEFAULT_MAX_BET_AMOUNT: i64 = 250;

/// Values the session engine and its backends are built from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameConfig {
    /// Balance given to a wallet when it is first created
    pub starting_balance: i64,
    /// Largest accepted `betAmount`
    pub max_bet_amount: i64,
    /// Lifetime of a per-client exclusion lock
    pub lock_ttl: Duration,
    /// Deadline for single-statement ledger queries
    pub query_timeout: Duration,
    /// Deadline for a whole balance adjustment transaction
    pub transaction_timeout: Duration,
    /// Deadline for one lock-store command
    pub lock_op_timeout: Duration,
}

impl GameConfig {
    /// Longest a wager can hold its lock when every step runs to its deadline:
    /// acquire, ensure, debit, credit, balance read, release.
    pub fn worst_case_play(&self) -> Duration {
        self.lock_op_timeout * 2 + self.query_timeout * 2 + self.transaction_timeout * 2
    }

    /// Whether the lock outlives any legitimate wager.
    pub fn lock_ttl_is_safe(&self) -> bool {
        self.lock_ttl > self.worst_case_play()
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            starting_balance: DEFAULT_STARTING_BALANCE,
            max_bet_amount: DEFAULT_MAX_BET_AMOUNT,
            lock_ttl: DEFAULT_LOCK_TTL,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            transaction_timeout: DEFAULT_TRANSACTION_TIMEOUT,
            lock_op_timeout: DEFAULT_LOCK_OP_TIMEOUT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GameConfig::default();
        assert_eq!(config.starting_balance, 500);
        assert_eq!(config.max_bet_amount, 250);
        assert_eq!(config.worst_case_play(), Duration::from_secs(20));
        assert!(config.lock_ttl_is_safe());
    }

    #[test]
    fn test_short_ttl_is_unsafe() {
        let config = GameConfig {
            lock_ttl: Duration::from_secs(20),
            ..GameConfig::default()
        };
        assert!(!config.lock_ttl_is_safe());
    }
}
