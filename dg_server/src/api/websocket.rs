//! WebSocket handler for the game protocol.
//!
//! Each connection gets its own [`Session`]. Inbound text frames are handled
//! one at a time: the next frame is not read until every response to the
//! current one has been queued. Responses go through a channel to a send
//! task, which keeps them in order.
//!
//! # Connection Flow
//!
//! 1. Client connects via `GET /ws`
//! 2. Server spawns a send task draining the response channel
//! 3. Each text frame is handed to the session and its responses queued
//! 4. After `end_play` the server closes the connection itself
//!
//! On shutdown a connection stops reading, finishes the frame in hand, and
//! closes. It stays counted in [`ConnectionTracker`] until then.
//!
//! # Example
//!
//! ```javascript
//! const ws = new WebSocket('ws://localhost:8080/ws');
//!
//! ws.send(JSON.stringify({
//!   type: "play",
//!   payload: { clientId: "alice", betAmount: 50, betType: "lt7" }
//! }));
//! ```

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use dice_game::{ServerMessage, Session};
use futures_util::{SinkExt, StreamExt};
use log::{error, info, warn};
use std::time::Instant;
use uuid::Uuid;

use super::{AppState, connections::ConnectionGuard};
use crate::{logging, metrics};

/// Frames queued for the send task
enum Outbound {
    Message(ServerMessage),
    Close,
}

/// Upgrade an HTTP connection to a game session.
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    if state.connections.is_shutting_down() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    let guard = state.connections.track();
    ws.on_upgrade(move |socket| handle_socket(socket, state, guard))
}

/// Run one connection until the client leaves, the transport fails, or the
/// session ends.
async fn handle_socket(socket: WebSocket, state: AppState, _guard: ConnectionGuard) {
    let (mut sender, mut receiver) = socket.split();
    let mut shutdown = state.connections.shutdown_signal();
    let connection_id = Uuid::new_v4();

    info!("WebSocket connected: connection={}", connection_id);
    metrics::websocket_connection_opened();

    let mut session = Session::new(state.services.clone());

    // Create channel for sending responses from message handler
    let (response_tx, mut response_rx) = tokio::sync::mpsc::channel::<Outbound>(32);

    let send_task = tokio::spawn(async move {
        while let Some(outbound) = response_rx.recv().await {
            match outbound {
                Outbound::Message(message) => {
                    let json = match message.to_json() {
                        Ok(j) => j,
                        Err(e) => {
                            error!("Failed to serialize response: {}", e);
                            continue;
                        }
                    };

                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                    metrics::record_outbound(&message);
                }
                Outbound::Close => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    // Receive messages from client
    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown.wait_for(|stopping| *stopping) => None,
            msg = receiver.next() => match msg {
                Some(msg) => Some(msg),
                None => break,
            },
        };

        let Some(msg) = next else {
            info!(
                "Server shutting down, closing connection {} (client {:?})",
                connection_id,
                session.client_id()
            );
            let _ = response_tx.send(Outbound::Close).await;
            break;
        };

        match msg {
            Ok(Message::Text(text)) => {
                metrics::websocket_messages_received();
                let started = Instant::now();

                let responses = session.handle_text(text.as_str()).await;

                let elapsed = started.elapsed();
                let kind = message_kind(text.as_str());
                metrics::message_duration_ms(kind, elapsed.as_secs_f64() * 1000.0);
                logging::log_performance(
                    kind,
                    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                    session.client_id(),
                );

                let mut delivered = true;
                for response in responses {
                    if response_tx.send(Outbound::Message(response)).await.is_err() {
                        delivered = false;
                        break;
                    }
                }
                if !delivered {
                    warn!(
                        "Send task gone, dropping connection {} (client {:?})",
                        connection_id,
                        session.client_id()
                    );
                    break;
                }

                if session.is_closed() {
                    info!(
                        "Closing connection {} after end_play for client {:?}",
                        connection_id,
                        session.client_id()
                    );
                    let _ = response_tx.send(Outbound::Close).await;
                    break;
                }
            }
            Ok(Message::Close(_)) => {
                info!(
                    "WebSocket closed by client: connection={}, client={:?}",
                    connection_id,
                    session.client_id()
                );
                break;
            }
            Err(e) => {
                error!("WebSocket error on connection {}: {}", connection_id, e);
                break;
            }
            // Binary frames are not part of the protocol; pings are answered by axum
            _ => {}
        }
    }

    // Let queued responses drain before the socket is dropped
    drop(response_tx);
    if let Err(e) = send_task.await {
        error!("Send task for connection {} failed: {}", connection_id, e);
    }

    metrics::websocket_connection_closed();
    info!(
        "WebSocket disconnected: connection={}, client={:?}",
        connection_id,
        session.client_id()
    );
}

/// Message type label for metrics and performance logs.
fn message_kind(text: &str) -> &'static str {
    use dice_game::net::messages::{MSG_END_PLAY, MSG_GET_BALANCE, MSG_PLAY};

    #[derive(serde::Deserialize)]
    struct Kind<'a> {
        #[serde(rename = "type", borrow)]
        kind: std::borrow::Cow<'a, str>,
    }

    match serde_json::from_str::<Kind<'_>>(text) {
        Ok(k) if k.kind == MSG_PLAY => MSG_PLAY,
        Ok(k) if k.kind == MSG_GET_BALANCE => MSG_GET_BALANCE,
        Ok(k) if k.kind == MSG_END_PLAY => MSG_END_PLAY,
        Ok(_) => "unknown",
        Err(_) => "malformed",
    }
}
