//! Wallet data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Client identity as supplied on the wire. Not authenticated.
pub type ClientId = String;

/// Currency code every wallet is denominated in
pub const DEFAULT_CURRENCY: &str = "PTS";

/// Balance a wallet is created with on first interaction
pub const DEFAULT_STARTING_BALANCE: i64 = 500;

/// Wallet model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub client_id: ClientId,
    pub balance: i64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
