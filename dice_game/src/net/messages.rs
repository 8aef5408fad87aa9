use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::fmt;

use super::errors::{ProtocolError, Result};
use crate::game::{Outcome, RoundOutcome, Wager};

pub const MSG_PLAY: &str = "play";
pub const MSG_GET_BALANCE: &str = "get_balance";
pub const MSG_END_PLAY: &str = "end_play";

/// Raw inbound frame before the payload is interpreted.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: serde_json::Value,
}

/// Payload of a `play` request.
///
/// Missing fields decode to empty values so that validation, not decoding,
/// decides which error code the client sees.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayRequest {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub bet_amount: i64,
    #[serde(default)]
    pub bet_type: String,
}

/// Payload of requests that carry only the client identity.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRef {
    #[serde(default)]
    pub client_id: String,
}

/// A message from a client.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ClientRequest {
    /// Place a wager.
    Play(PlayRequest),
    /// Ask for the current balance.
    GetBalance(ClientRef),
    /// Finish the session; the connection closes afterwards.
    EndPlay(ClientRef),
    /// A well-formed envelope whose type this server does not handle.
    Unknown(String),
}

impl ClientRequest {
    /// Decode a text frame.
    ///
    /// # Errors
    ///
    /// * `ProtocolError::MalformedEnvelope` - Not a `{type, payload}` object
    /// * `ProtocolError::InvalidPayload` - Known type with a mistyped payload
    pub fn parse(text: &str) -> Result<Self> {
        let envelope: Envelope =
            serde_json::from_str(text).map_err(ProtocolError::MalformedEnvelope)?;

        match envelope.kind.as_str() {
            MSG_PLAY => Ok(Self::Play(decode_payload(MSG_PLAY, envelope.payload)?)),
            MSG_GET_BALANCE => Ok(Self::GetBalance(decode_payload(
                MSG_GET_BALANCE,
                envelope.payload,
            )?)),
            MSG_END_PLAY => Ok(Self::EndPlay(decode_payload(MSG_END_PLAY, envelope.payload)?)),
            _ => Ok(Self::Unknown(envelope.kind)),
        }
    }

    /// Identity declared by the request, if the type carries one.
    pub fn client_id(&self) -> Option<&str> {
        match self {
            Self::Play(p) => Some(&p.client_id),
            Self::GetBalance(r) | Self::EndPlay(r) => Some(&r.client_id),
            Self::Unknown(_) => None,
        }
    }

    /// Wire name of the request type.
    pub fn kind(&self) -> &str {
        match self {
            Self::Play(_) => MSG_PLAY,
            Self::GetBalance(_) => MSG_GET_BALANCE,
            Self::EndPlay(_) => MSG_END_PLAY,
            Self::Unknown(kind) => kind,
        }
    }
}

fn decode_payload<T: DeserializeOwned>(kind: &'static str, payload: serde_json::Value) -> Result<T> {
    // A missing payload is treated like an empty object.
    let payload = if payload.is_null() {
        serde_json::Value::Object(Default::default())
    } else {
        payload
    };
    serde_json::from_value(payload).map_err(|source| ProtocolError::InvalidPayload { kind, source })
}

/// Client-facing error codes.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    BadRequest,
    InternalError,
    ActivePlayExists,
    InvalidBet,
    BetTooHigh,
    InvalidBetType,
    InsufficientFunds,
    WalletNotFound,
    UnknownType,
    FailedLockRelease,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadRequest => "BAD_REQUEST",
            Self::InternalError => "INTERNAL_ERROR",
            Self::ActivePlayExists => "ACTIVE_PLAY_EXISTS",
            Self::InvalidBet => "INVALID_BET",
            Self::BetTooHigh => "BET_TOO_HIGH",
            Self::InvalidBetType => "INVALID_BET_TYPE",
            Self::InsufficientFunds => "INSUFFICIENT_FUNDS",
            Self::WalletNotFound => "WALLET_NOT_FOUND",
            Self::UnknownType => "UNKNOWN_TYPE",
            Self::FailedLockRelease => "FAILED_LOCK_RELEASE",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayResult {
    pub client_id: String,
    pub die1: u8,
    pub die2: u8,
    pub outcome: Outcome,
    pub bet_amount: i64,
    pub winnings: i64,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceUpdate {
    pub client_id: String,
    pub balance: i64,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayEnded {
    pub client_id: String,
    /// `-1` when the balance could not be read.
    pub final_balance: i64,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ErrorPayload {
    pub code: ErrorCode,
    pub message: String,
}

/// A message from the server to a client.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    PlayResult(PlayResult),
    BalanceUpdate(BalanceUpdate),
    PlayEnded(PlayEnded),
    Error(ErrorPayload),
}

impl ServerMessage {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error(ErrorPayload {
            code,
            message: message.into(),
        })
    }

    pub fn balance(client_id: &str, balance: i64) -> Self {
        Self::BalanceUpdate(BalanceUpdate {
            client_id: client_id.to_string(),
            balance,
        })
    }

    pub fn play_result(wager: &Wager, round: &RoundOutcome) -> Self {
        Self::PlayResult(PlayResult {
            client_id: wager.client_id.clone(),
            die1: round.roll.die1,
            die2: round.roll.die2,
            outcome: round.outcome,
            bet_amount: wager.amount,
            winnings: round.winnings,
        })
    }

    pub fn play_ended(client_id: &str, final_balance: i64) -> Self {
        Self::PlayEnded(PlayEnded {
            client_id: client_id.to_string(),
            final_balance,
        })
    }

    /// Error code carried by an `error` message.
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Error(e) => Some(e.code),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PlayResult(r) => write!(
                f,
                "play_result {} rolled {}+{}: {} (bet {}, won {})",
                r.client_id, r.die1, r.die2, r.outcome, r.bet_amount, r.winnings
            ),
            Self::BalanceUpdate(b) => write!(f, "balance_update {} = {}", b.client_id, b.balance),
            Self::PlayEnded(p) => write!(f, "play_ended {} final {}", p.client_id, p.final_balance),
            Self::Error(e) => write!(f, "error {}: {}", e.code, e.message),
        }
    }
}
