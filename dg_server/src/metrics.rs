//! Prometheus metrics for monitoring the dice server.
//!
//! Metrics are exposed in Prometheus text format on a separate listener
//! when `METRICS_BIND` is set. Without an installed recorder every helper
//! here is a no-op.
//!
//! # Metrics Categories
//!
//! - **WebSocket Metrics**: Active connections, messages sent/received
//! - **Response Metrics**: Error frames by code
//!
//! Wager outcomes, lock contention and reconciliation counters are recorded
//! by `dice_game::session::telemetry` where those events happen, and land in
//! the same exporter.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use dg_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! metrics::websocket_connection_opened();
//! ```

use dice_game::{ServerMessage, net::messages::ErrorCode};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// Sets up a Prometheus scrape endpoint on the specified address.
/// Metrics will be available at `http://<addr>/metrics`.
///
/// # Arguments
///
/// - `addr`: Address to bind the metrics server to (e.g., `0.0.0.0:9090`)
///
/// # Returns
///
/// Result indicating success or error message
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// WebSocket Metrics
// ============================================================================

/// Record a new WebSocket connection.
pub fn websocket_connection_opened() {
    metrics::counter!("websocket_connections_total").increment(1);
    metrics::gauge!("websocket_connections_active").increment(1.0);
}

/// Record a WebSocket connection ending.
pub fn websocket_connection_closed() {
    metrics::gauge!("websocket_connections_active").decrement(1.0);
}

/// Increment WebSocket messages sent counter.
pub fn websocket_messages_sent() {
    metrics::counter!("websocket_messages_sent").increment(1);
}

/// Increment WebSocket messages received counter.
pub fn websocket_messages_received() {
    metrics::counter!("websocket_messages_received").increment(1);
}

/// Record the time taken to process one inbound message.
pub fn message_duration_ms(message_type: &str, duration_ms: f64) {
    metrics::histogram!("message_duration_ms",
        "type" => message_type.to_string()
    )
    .record(duration_ms);
}

// ============================================================================
// Response Metrics
// ============================================================================

/// Increment error responses by code.
pub fn error_responses_total(code: ErrorCode) {
    metrics::counter!("error_responses_total",
        "code" => code.as_str()
    )
    .increment(1);
}

/// Record the metrics an outbound frame implies.
pub fn record_outbound(message: &ServerMessage) {
    websocket_messages_sent();
    if let Some(code) = message.error_code() {
        error_responses_total(code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helpers_without_recorder() {
        // No recorder installed: every call is a no-op
        websocket_connection_opened();
        websocket_connection_closed();
        message_duration_ms("play", 1.5);
        record_outbound(&ServerMessage::error(
            ErrorCode::ActivePlayExists,
            "Previous play still processing.",
        ));
        record_outbound(&ServerMessage::balance("alice", 10));
    }

    #[test]
    fn test_outbound_frames_count_sends_and_error_codes_only() {
        let recorder = dice_game::mocks::CountingRecorder::new();
        metrics::with_local_recorder(&recorder, || {
            record_outbound(&ServerMessage::error(
                ErrorCode::ActivePlayExists,
                "Previous play still processing.",
            ));
            record_outbound(&ServerMessage::balance("alice", 10));
        });

        assert_eq!(recorder.count("websocket_messages_sent"), 2);
        assert_eq!(
            recorder.count("error_responses_total{code=ACTIVE_PLAY_EXISTS}"),
            1
        );
        // Counted by the engine when the play is refused, not per frame
        assert_eq!(recorder.count("lock_contention_total"), 0);
    }
}
