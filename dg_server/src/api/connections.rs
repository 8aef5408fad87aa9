//! Shutdown coordination for upgraded WebSocket connections.
//!
//! `axum::serve` stops waiting for a connection once it has been upgraded, so
//! the server counts live sessions itself. On shutdown every session stops
//! reading new frames, finishes the frame it is handling, and closes. The
//! caller then waits for the count to reach zero before closing the pool.

use std::{sync::Arc, time::Duration};
use tokio::sync::watch;

/// Shared shutdown flag and live connection count.
#[derive(Debug)]
pub struct ConnectionTracker {
    shutdown: watch::Sender<bool>,
    live: watch::Sender<usize>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self {
            shutdown: watch::Sender::new(false),
            live: watch::Sender::new(0),
        }
    }

    /// Tell every session to stop taking frames.
    pub fn begin_shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Receiver that resolves `wait_for(|s| *s)` once shutdown begins.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Count a connection until the returned guard is dropped.
    pub fn track(self: &Arc<Self>) -> ConnectionGuard {
        self.live.send_modify(|n| *n += 1);
        ConnectionGuard {
            tracker: Arc::clone(self),
        }
    }

    /// Number of connections currently tracked
    pub fn live(&self) -> usize {
        *self.live.borrow()
    }

    /// Wait up to `limit` for every tracked connection to finish.
    ///
    /// Returns `false` if connections were still open at the deadline.
    pub async fn wait_idle(&self, limit: Duration) -> bool {
        let mut live = self.live.subscribe();
        matches!(
            tokio::time::timeout(limit, live.wait_for(|n| *n == 0)).await,
            Ok(Ok(_))
        )
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps one connection counted in its [`ConnectionTracker`].
#[derive(Debug)]
pub struct ConnectionGuard {
    tracker: Arc<ConnectionTracker>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.tracker.live.send_modify(|n| *n = n.saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_guards_are_counted_until_dropped() {
        let tracker = Arc::new(ConnectionTracker::new());
        let first = tracker.track();
        let second = tracker.track();
        assert_eq!(tracker.live(), 2);

        drop(first);
        assert_eq!(tracker.live(), 1);
        drop(second);
        assert_eq!(tracker.live(), 0);
    }

    #[tokio::test]
    async fn test_wait_idle_returns_once_last_guard_drops() {
        let tracker = Arc::new(ConnectionTracker::new());
        let guard = tracker.track();

        let waiter = {
            let tracker = Arc::clone(&tracker);
            tokio::spawn(async move { tracker.wait_idle(Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(guard);

        assert!(waiter.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_idle_gives_up_at_the_deadline() {
        let tracker = Arc::new(ConnectionTracker::new());
        let _guard = tracker.track();

        assert!(!tracker.wait_idle(Duration::from_secs(1)).await);
        assert_eq!(tracker.live(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_signal_sees_earlier_shutdown() {
        let tracker = ConnectionTracker::new();
        assert!(!tracker.is_shutting_down());

        tracker.begin_shutdown();
        let mut signal = tracker.shutdown_signal();

        assert!(signal.wait_for(|stopping| *stopping).await.is_ok());
        assert!(tracker.is_shutting_down());
    }
}
