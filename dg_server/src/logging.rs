//! Structured logging configuration.
//!
//! The library crate logs through the `log` facade; the subscriber installed
//! here also captures those records, so both end up in one stream.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Log target used for per-message performance records
pub const PERFORMANCE_TARGET: &str = "dg_server::performance";

/// Messages slower than this are logged at warn level
pub const SLOW_MESSAGE_MS: u64 = 1000;

/// Initialize structured logging
///
/// Log levels come from `RUST_LOG`, defaulting to `info,sqlx=warn`.
///
/// # Example
///
/// ```no_run
/// use dg_server::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("Server starting");
/// }
/// ```
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,hyper=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    // Also installs the `log` bridge
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log how long one inbound message took to process
///
/// # Arguments
///
/// * `operation` - Message type
/// * `duration_ms` - Duration in milliseconds
/// * `client_id` - Identity bound to the connection, if any
///
/// # Example
///
/// ```
/// use dg_server::logging::log_performance;
/// use std::time::Instant;
///
/// let start = Instant::now();
/// // ... handle a message ...
/// let duration = start.elapsed().as_millis() as u64;
/// log_performance("play", duration, Some("alice"));
/// ```
pub fn log_performance(operation: &str, duration_ms: u64, client_id: Option<&str>) {
    if duration_ms > SLOW_MESSAGE_MS {
        tracing::warn!(
            target: PERFORMANCE_TARGET,
            operation = operation,
            duration_ms = duration_ms,
            client_id = client_id,
            "PERFORMANCE: Slow message"
        );
    } else {
        tracing::debug!(
            target: PERFORMANCE_TARGET,
            operation = operation,
            duration_ms = duration_ms,
            client_id = client_id,
            "Message processed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_performance() {
        // Just ensure it doesn't panic without a subscriber
        log_performance("play", 5, Some("alice"));
        log_performance("get_balance", 2000, None);
    }
}
