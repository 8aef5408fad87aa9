//! Protocol decoding errors.

use thiserror::Error;

/// Errors raised while decoding an inbound frame
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame is not a `{type, payload}` JSON object
    #[error("Invalid message envelope: {0}")]
    MalformedEnvelope(#[source] serde_json::Error),

    /// Envelope type is known but its payload does not match
    #[error("Invalid {kind} payload: {source}")]
    InvalidPayload {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for protocol decoding
pub type Result<T> = std::result::Result<T, ProtocolError>;
