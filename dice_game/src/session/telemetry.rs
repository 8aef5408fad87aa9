//! Wager counters, emitted through the `metrics` facade.
//!
//! They are recorded where the event happens, not when a frame reaches the
//! client, so a dropped connection cannot hide a stranded debit. Without an
//! installed recorder every call is a no-op.

use crate::game::Outcome;

pub const WAGERS_TOTAL: &str = "wagers_total";
pub const LOCK_CONTENTION_TOTAL: &str = "lock_contention_total";
pub const RECONCILIATION_REQUIRED_TOTAL: &str = "reconciliation_required_total";

/// Why a ledger needs manual reconciliation
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Reconciliation {
    /// Winnings could not be credited after the debit committed
    CreditFailed,
    /// A stake could not be returned after resolution failed
    RefundFailed,
    /// The debit's deadline expired; it may or may not have committed
    DebitOutcomeUnknown,
}

impl Reconciliation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreditFailed => "credit_failed",
            Self::RefundFailed => "refund_failed",
            Self::DebitOutcomeUnknown => "debit_outcome_unknown",
        }
    }
}

/// Count a resolved round.
pub fn wager_resolved(outcome: Outcome) {
    metrics::counter!(WAGERS_TOTAL, "outcome" => outcome.to_string()).increment(1);
}

/// Count a play refused because the client's lock was held.
pub fn lock_contention() {
    metrics::counter!(LOCK_CONTENTION_TOTAL).increment(1);
}

/// Count a ledger left needing reconciliation.
pub fn reconciliation_required(reason: Reconciliation) {
    metrics::counter!(RECONCILIATION_REQUIRED_TOTAL, "reason" => reason.as_str()).increment(1);
}
