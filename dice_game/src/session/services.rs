//! Wager settlement against the ledger, the exclusion lock and the resolver.

use std::{fmt, sync::Arc};

use log::{debug, error, info, warn};

use super::telemetry::{self, Reconciliation};
use crate::{
    game::{BetType, RoundResolver, Wager},
    lock::{ExclusionLock, run_exclusive},
    net::messages::{ErrorCode, PlayRequest, ServerMessage},
    wallet::{Ledger, WalletError},
};

/// Log target for events that leave a ledger needing manual reconciliation.
pub const RECONCILIATION_TARGET: &str = "dice_game::reconciliation";

const CREDIT_FAILED_MESSAGE: &str = "Failed to credit winnings.";

/// Shared backends every session drives. Cheap to clone.
#[derive(Clone)]
pub struct GameServices {
    pub ledger: Arc<dyn Ledger>,
    pub lock: Arc<dyn ExclusionLock>,
    pub resolver: RoundResolver,
    pub max_bet_amount: i64,
}

fn internal(message: &str) -> ServerMessage {
    ServerMessage::error(ErrorCode::InternalError, message)
}

impl GameServices {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        lock: Arc<dyn ExclusionLock>,
        resolver: RoundResolver,
        max_bet_amount: i64,
    ) -> Self {
        Self {
            ledger,
            lock,
            resolver,
            max_bet_amount,
        }
    }

    /// Check a play request and turn it into a wager.
    ///
    /// Amount is checked before bet type, so a request wrong on both counts
    /// reports the amount.
    pub fn validate_wager(&self, request: &PlayRequest) -> Result<Wager, ServerMessage> {
        if request.bet_amount <= 0 {
            return Err(ServerMessage::error(
                ErrorCode::InvalidBet,
                "Bet amount must be greater than zero.",
            ));
        }
        if request.bet_amount > self.max_bet_amount {
            return Err(ServerMessage::error(
                ErrorCode::BetTooHigh,
                "Bet amount exceeds maximum limit.",
            ));
        }
        let bet_type: BetType = request.bet_type.parse().map_err(|_| {
            ServerMessage::error(
                ErrorCode::InvalidBetType,
                "Invalid bet type specified (must be 'lt7' or 'gt7').",
            )
        })?;

        Ok(Wager {
            client_id: request.client_id.clone(),
            amount: request.bet_amount,
            bet_type,
        })
    }

    /// Run one validated wager under the client's exclusion lock.
    ///
    /// Returns the messages for the client in emission order. The lock is
    /// released before this returns, whatever happened inside.
    pub async fn play(&self, wager: &Wager) -> Vec<ServerMessage> {
        let client_id = wager.client_id.as_str();

        let scoped = match run_exclusive(self.lock.as_ref(), client_id, self.settle_wager(wager))
            .await
        {
            Ok(Some(scoped)) => scoped,
            Ok(None) => {
                info!("Rejected concurrent play for client {}", client_id);
                telemetry::lock_contention();
                return vec![ServerMessage::error(
                    ErrorCode::ActivePlayExists,
                    "Previous play still processing.",
                )];
            }
            Err(e) => {
                error!("Lock store error acquiring lock for client {}: {}", client_id, e);
                return vec![internal("Failed to check play status.")];
            }
        };

        let mut messages = scoped.output;
        match scoped.release {
            Ok(true) => debug!("Released play lock for client {}", client_id),
            Ok(false) => warn!(
                "Play lock for client {} expired before release; lock TTL may be too short",
                client_id
            ),
            Err(e) => {
                error!("Failed to release play lock for client {}: {}", client_id, e);
                messages.push(ServerMessage::error(
                    ErrorCode::FailedLockRelease,
                    "Lock release failed, state may be inconsistent.",
                ));
            }
        }
        messages
    }

    /// Debit, resolve, then credit or compensate. Runs while the lock is held.
    async fn settle_wager(&self, wager: &Wager) -> Vec<ServerMessage> {
        let client_id = wager.client_id.as_str();

        if let Err(e) = self.ledger.ensure_wallet(client_id).await {
            error!("Failed to ensure wallet for client {}: {}", client_id, e);
            return vec![internal("Could not prepare wallet.")];
        }

        match self.ledger.adjust_balance(client_id, -wager.amount).await {
            Ok(balance) => debug!(
                "Debited {} from client {}, balance now {}",
                wager.amount, client_id, balance
            ),
            Err(WalletError::InsufficientFunds {
                available,
                required,
            }) => {
                info!(
                    "Client {} cannot cover bet of {} (balance {})",
                    client_id, required, available
                );
                return vec![ServerMessage::error(
                    ErrorCode::InsufficientFunds,
                    "You do not have enough balance for this bet.",
                )];
            }
            Err(WalletError::Timeout(after)) => {
                // The deadline may have fired after COMMIT was sent
                error!(
                    target: RECONCILIATION_TARGET,
                    "CRITICAL: debit of {} for client {} timed out after {:?}; outcome unknown",
                    wager.amount, client_id, after
                );
                telemetry::reconciliation_required(Reconciliation::DebitOutcomeUnknown);
                return vec![internal("Failed to process bet debit.")];
            }
            Err(e) => {
                error!("Wallet debit failed for client {}: {}", client_id, e);
                return vec![internal("Failed to process bet debit.")];
            }
        }

        let round = match self.resolver.play_round(wager.bet_type, wager.amount) {
            Ok(round) => round,
            Err(e) => {
                error!("Round resolution failed for client {}: {}", client_id, e);
                self.refund(wager).await;
                return vec![internal("Failed during game logic.")];
            }
        };

        telemetry::wager_resolved(round.outcome);

        let mut messages = Vec::with_capacity(3);
        let balance = if round.is_win() {
            // resolve() has already rejected payouts that overflow
            let credit = wager.amount + round.winnings;
            match self.ledger.adjust_balance(client_id, credit).await {
                Ok(balance) => {
                    debug!(
                        "Credited {} to client {}, balance now {}",
                        credit, client_id, balance
                    );
                    Some(balance)
                }
                Err(e) => {
                    error!(
                        target: RECONCILIATION_TARGET,
                        "CRITICAL: credit of {} failed for client {} after committed debit of {}: {}",
                        credit, client_id, wager.amount, e
                    );
                    telemetry::reconciliation_required(Reconciliation::CreditFailed);
                    messages.push(internal(CREDIT_FAILED_MESSAGE));
                    self.ledger.get_balance(client_id).await.ok()
                }
            }
        } else {
            match self.ledger.get_balance(client_id).await {
                Ok(balance) => Some(balance),
                Err(e) => {
                    error!("Failed to read balance after loss for client {}: {}", client_id, e);
                    messages.push(internal("Failed to retrieve balance state."));
                    None
                }
            }
        };

        messages.push(ServerMessage::play_result(wager, &round));
        match balance {
            Some(balance) => messages.push(ServerMessage::balance(client_id, balance)),
            None => warn!(
                "Could not determine balance for client {} after play",
                client_id
            ),
        }
        messages
    }

    /// Return a debited stake after the round could not be resolved.
    async fn refund(&self, wager: &Wager) {
        let client_id = wager.client_id.as_str();
        match self.ledger.adjust_balance(client_id, wager.amount).await {
            Ok(balance) => info!(
                "Refunded {} to client {}, balance now {}",
                wager.amount, client_id, balance
            ),
            Err(e) => {
                error!(
                    target: RECONCILIATION_TARGET,
                    "CRITICAL: refund of {} failed for client {}: {}",
                    wager.amount, client_id, e
                );
                telemetry::reconciliation_required(Reconciliation::RefundFailed);
            }
        }
    }

    /// Ensure the wallet exists, then report its balance.
    pub async fn balance_snapshot(&self, client_id: &str) -> ServerMessage {
        if let Err(e) = self.ledger.ensure_wallet(client_id).await {
            error!("Failed to ensure wallet for client {}: {}", client_id, e);
            return internal("Could not prepare wallet.");
        }

        match self.ledger.get_balance(client_id).await {
            Ok(balance) => ServerMessage::balance(client_id, balance),
            Err(WalletError::WalletNotFound(_)) => {
                ServerMessage::error(ErrorCode::WalletNotFound, "Wallet not found.")
            }
            Err(e) => {
                error!("Failed to read balance for client {}: {}", client_id, e);
                internal("Failed to retrieve balance.")
            }
        }
    }

    /// Final balance for a closing session. Never creates a wallet; an
    /// unreadable balance is reported as `-1` after an error message.
    pub async fn final_balance(&self, client_id: &str) -> Vec<ServerMessage> {
        let mut messages = Vec::with_capacity(2);
        let balance = match self.ledger.get_balance(client_id).await {
            Ok(balance) => balance,
            Err(WalletError::WalletNotFound(_)) => {
                messages.push(ServerMessage::error(
                    ErrorCode::WalletNotFound,
                    "Wallet not found.",
                ));
                -1
            }
            Err(e) => {
                error!("Failed to read final balance for client {}: {}", client_id, e);
                messages.push(internal("Failed to retrieve final balance."));
                -1
            }
        };
        messages.push(ServerMessage::play_ended(client_id, balance));
        messages
    }
}

impl fmt::Debug for GameServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameServices")
            .field("resolver", &self.resolver)
            .field("max_bet_amount", &self.max_bet_amount)
            .finish_non_exhaustive()
    }
}
