//! Per-connection session protocol engine.
//!
//! A [`Session`] owns the state of one live connection: the client identity
//! bound to it and where it is in the `Idle -> Busy -> Idle` cycle. It takes
//! one inbound frame at a time and returns the frames to send back, in order.
//! The transport must not hand it frame N+1 before the messages for frame N
//! have been produced; that is what keeps a connection strictly sequential.
//!
//! Identity is whatever the client says it is. The first non-empty
//! `clientId` binds the connection and every later message must repeat it.

pub mod config;
pub mod services;
pub mod telemetry;

pub use config::{DEFAULT_MAX_BET_AMOUNT, GameConfig};
pub use services::{GameServices, RECONCILIATION_TARGET};

use log::{debug, info, warn};

use crate::{
    net::{
        errors::ProtocolError,
        messages::{ClientRequest, ErrorCode, PlayRequest, ServerMessage},
    },
    wallet::ClientId,
};

/// Where a session is in its lifecycle.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionState {
    /// Waiting for the next message
    Idle,
    /// A wager is in flight
    Busy,
    /// `end_play` was handled; no further input is processed
    Closed,
}

#[derive(Debug)]
pub struct Session {
    services: GameServices,
    client_id: Option<ClientId>,
    state: SessionState,
}

impl Session {
    pub fn new(services: GameServices) -> Self {
        Self {
            services,
            client_id: None,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Identity bound to this connection, once one has been seen.
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// Decode and handle one text frame.
    pub async fn handle_text(&mut self, text: &str) -> Vec<ServerMessage> {
        if self.is_closed() {
            return Vec::new();
        }

        match ClientRequest::parse(text) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                warn!(
                    "Rejected frame for client {}: {}",
                    self.client_id().unwrap_or("<unbound>"),
                    e
                );
                let message = match e {
                    ProtocolError::InvalidPayload { kind, .. } => {
                        format!("Invalid {kind} payload format")
                    }
                    ProtocolError::MalformedEnvelope(_) => {
                        "Invalid message format".to_string()
                    }
                };
                vec![ServerMessage::error(ErrorCode::BadRequest, message)]
            }
        }
    }

    /// Handle one decoded request.
    pub async fn handle(&mut self, request: ClientRequest) -> Vec<ServerMessage> {
        if self.is_closed() {
            return Vec::new();
        }

        debug!(
            "Received {} for client {}",
            request.kind(),
            self.client_id().unwrap_or("<unbound>")
        );

        match request {
            ClientRequest::Unknown(kind) => {
                warn!("Unknown message type {:?}", kind);
                vec![ServerMessage::error(
                    ErrorCode::UnknownType,
                    "Unknown message type received.",
                )]
            }
            ClientRequest::Play(play) => match self.bind_identity(&play.client_id) {
                Ok(()) => self.place_wager(play).await,
                Err(rejection) => vec![rejection],
            },
            ClientRequest::GetBalance(r) => match self.bind_identity(&r.client_id) {
                Ok(()) => vec![self.services.balance_snapshot(&r.client_id).await],
                Err(rejection) => vec![rejection],
            },
            ClientRequest::EndPlay(r) => match self.bind_identity(&r.client_id) {
                Ok(()) => {
                    let messages = self.services.final_balance(&r.client_id).await;
                    info!("Session for client {} ended", r.client_id);
                    self.state = SessionState::Closed;
                    messages
                }
                Err(rejection) => vec![rejection],
            },
        }
    }

    /// Bind the connection to `client_id` on first sight, then hold it to it.
    fn bind_identity(&mut self, client_id: &str) -> Result<(), ServerMessage> {
        let accepted = if client_id.is_empty() {
            false
        } else if let Some(bound) = &self.client_id {
            bound == client_id
        } else {
            debug!("Connection bound to client {}", client_id);
            self.client_id = Some(client_id.to_string());
            true
        };

        if accepted {
            Ok(())
        } else {
            warn!(
                "Client ID mismatch or missing: bound {:?}, got {:?}",
                self.client_id, client_id
            );
            Err(ServerMessage::error(
                ErrorCode::BadRequest,
                "Client ID mismatch or missing",
            ))
        }
    }

    async fn place_wager(&mut self, request: PlayRequest) -> Vec<ServerMessage> {
        let wager = match self.services.validate_wager(&request) {
            Ok(wager) => wager,
            Err(rejection) => {
                info!("Invalid play from client {}: {}", request.client_id, rejection);
                return vec![rejection];
            }
        };

        self.state = SessionState::Busy;
        let messages = self.services.play(&wager).await;
        self.state = SessionState::Idle;
        messages
    }
}
