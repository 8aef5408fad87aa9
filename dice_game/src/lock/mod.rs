//! Per-client exclusion lock.
//!
//! A lock is a TTL-bounded key derived from the client identity. It is the
//! only thing that serializes wagers for one identity across different
//! connections, so it is keyed by client, never by connection, and it
//! survives reconnects. A holder that crashes is healed by the TTL.
//!
//! Callers should not pair `try_acquire`/`release` by hand; [`run_exclusive`]
//! releases on every exit path, including a panic in the body.

pub mod errors;
pub mod redis_store;

pub use errors::{LockError, LockResult};
pub use redis_store::{DEFAULT_LOCK_OP_TIMEOUT, DEFAULT_LOCK_TTL, RedisLock};

use async_trait::async_trait;
use futures_util::FutureExt;
use log::error;
use std::{future::Future, panic::AssertUnwindSafe};

/// Prefix for lock keys in the store
pub const LOCK_KEY_PREFIX: &str = "active_play:";

/// Opaque value stored under a held lock key
pub const LOCK_MARKER: &str = "locked";

/// Store key guarding wagers for `client_id`
pub fn lock_key(client_id: &str) -> String {
    format!("{LOCK_KEY_PREFIX}{client_id}")
}

/// Distributed, non-blocking mutual exclusion keyed by client identity.
#[async_trait]
pub trait ExclusionLock: Send + Sync {
    /// Create the lock key with its TTL if and only if it is absent.
    /// Returns `false` immediately when another holder has it; never waits.
    async fn try_acquire(&self, client_id: &str) -> LockResult<bool>;

    /// Delete the lock key. Returns whether a key was actually removed;
    /// `false` means it had already expired.
    async fn release(&self, client_id: &str) -> LockResult<bool>;
}

/// Output of a body that ran while holding the lock.
#[derive(Debug)]
pub struct Scoped<T> {
    /// Value produced by the body
    pub output: T,
    /// Outcome of the release that followed the body
    pub release: LockResult<bool>,
}

/// Acquire the lock for `client_id`, run `body`, then release.
///
/// Returns `Ok(None)` without running `body` when the lock is held elsewhere.
/// Release happens after the body returns or panics; a panic is resumed once
/// the key has been deleted.
///
/// # Errors
///
/// Returns the acquisition error if the lock store could not be asked.
pub async fn run_exclusive<L, F, T>(
    lock: &L,
    client_id: &str,
    body: F,
) -> LockResult<Option<Scoped<T>>>
where
    L: ExclusionLock + ?Sized,
    F: Future<Output = T>,
{
    if !lock.try_acquire(client_id).await? {
        return Ok(None);
    }

    let outcome = AssertUnwindSafe(body).catch_unwind().await;
    let release = lock.release(client_id).await;

    match outcome {
        Ok(output) => Ok(Some(Scoped { output, release })),
        Err(panic) => {
            if let Err(e) = &release {
                error!(
                    "Failed to release lock for client {} after panic: {}",
                    client_id, e
                );
            }
            std::panic::resume_unwind(panic)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::InMemoryLock;
    use std::time::Duration;

    #[test]
    fn test_lock_key_is_per_client() {
        assert_eq!(lock_key("alice"), "active_play:alice");
        assert_ne!(lock_key("alice"), lock_key("bob"));
    }

    #[tokio::test]
    async fn test_run_exclusive_releases_after_body() {
        let lock = InMemoryLock::new(Duration::from_secs(30));

        let scoped = run_exclusive(&lock, "alice", async {
            assert!(lock.is_held("alice").await);
            7
        })
        .await
        .unwrap()
        .expect("lock should be free");

        assert_eq!(scoped.output, 7);
        assert!(matches!(scoped.release, Ok(true)));
        assert!(!lock.is_held("alice").await);
    }

    #[tokio::test]
    async fn test_run_exclusive_skips_body_when_held() {
        let lock = InMemoryLock::new(Duration::from_secs(30));
        assert!(lock.try_acquire("alice").await.unwrap());

        let mut ran = false;
        let result = run_exclusive(&lock, "alice", async {
            ran = true;
        })
        .await
        .unwrap();

        assert!(result.is_none());
        assert!(!ran);
        // The existing holder keeps its lock
        assert!(lock.is_held("alice").await);
    }

    #[tokio::test]
    async fn test_run_exclusive_releases_on_panic() {
        let lock = std::sync::Arc::new(InMemoryLock::new(Duration::from_secs(30)));
        let task_lock = lock.clone();

        let handle = tokio::spawn(async move {
            let explode = true;
            run_exclusive(task_lock.as_ref(), "alice", async move {
                if explode {
                    panic!("wager body blew up");
                }
            })
            .await
        });

        assert!(handle.await.unwrap_err().is_panic());
        assert!(!lock.is_held("alice").await);
    }

    #[tokio::test]
    async fn test_run_exclusive_reports_release_failure() {
        let lock = InMemoryLock::new(Duration::from_secs(30));
        lock.fail_next_release();

        let scoped = run_exclusive(&lock, "alice", async {}).await.unwrap().unwrap();
        assert!(scoped.release.is_err());
    }

    #[tokio::test]
    async fn test_run_exclusive_propagates_acquire_error() {
        let lock = InMemoryLock::new(Duration::from_secs(30));
        lock.fail_next_acquire();

        let result = run_exclusive(&lock, "alice", async {}).await;
        assert!(result.is_err());
        assert!(!lock.is_held("alice").await);
    }
}
