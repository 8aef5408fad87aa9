//! Redis-backed exclusion lock.
//!
//! Acquisition is a single `SET key marker NX PX ttl`, so creating the key and
//! checking for a current holder happen atomically in the store. Release is a
//! plain `DEL`.

use super::{
    ExclusionLock, LOCK_MARKER,
    errors::{LockError, LockResult},
    lock_key,
};
use async_trait::async_trait;
use log::{debug, info};
use redis::{RedisResult, aio::ConnectionManager};
use std::{future::Future, time::Duration};

/// Default lifetime of a lock key before the store expires it
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(30);

/// Default deadline for a single lock store command
pub const DEFAULT_LOCK_OP_TIMEOUT: Duration = Duration::from_secs(2);

/// Exclusion lock stored in Redis
#[derive(Clone)]
pub struct RedisLock {
    conn: ConnectionManager,
    ttl: Duration,
    op_timeout: Duration,
}

impl RedisLock {
    /// Connect to the lock store
    ///
    /// # Arguments
    ///
    /// * `url` - Redis connection URL (e.g. `redis://127.0.0.1:6379/0`)
    /// * `ttl` - Lifetime of an acquired lock
    /// * `op_timeout` - Deadline for each lock store command
    pub async fn connect(url: &str, ttl: Duration, op_timeout: Duration) -> LockResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = tokio::time::timeout(op_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| LockError::Timeout(op_timeout))??;

        info!("Connected to lock store (ttl {:?})", ttl);
        Ok(Self {
            conn,
            ttl,
            op_timeout,
        })
    }

    /// Lifetime given to each acquired lock
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Check that the lock store answers
    pub async fn ping(&self) -> LockResult<()> {
        let mut conn = self.conn.clone();
        let _pong: String = self.deadline(redis::cmd("PING").query_async(&mut conn)).await?;
        Ok(())
    }

    async fn deadline<T>(&self, fut: impl Future<Output = RedisResult<T>>) -> LockResult<T> {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(LockError::Timeout(self.op_timeout)),
        }
    }
}

#[async_trait]
impl ExclusionLock for RedisLock {
    async fn try_acquire(&self, client_id: &str) -> LockResult<bool> {
        let key = lock_key(client_id);
        let ttl_ms = u64::try_from(self.ttl.as_millis()).unwrap_or(u64::MAX);

        let mut cmd = redis::cmd("SET");
        cmd.arg(&key)
            .arg(LOCK_MARKER)
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms);

        let mut conn = self.conn.clone();
        let reply: Option<String> = self.deadline(cmd.query_async(&mut conn)).await?;

        let acquired = reply.is_some();
        if acquired {
            debug!("Acquired lock {}", key);
        }
        Ok(acquired)
    }

    async fn release(&self, client_id: &str) -> LockResult<bool> {
        let key = lock_key(client_id);

        let mut cmd = redis::cmd("DEL");
        cmd.arg(&key);

        let mut conn = self.conn.clone();
        let deleted: i64 = self.deadline(cmd.query_async(&mut conn)).await?;

        if deleted > 0 {
            debug!("Released lock {}", key);
        }
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redis_url() -> String {
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379/0".to_string())
    }

    #[tokio::test]
    #[ignore = "requires a running Redis instance (REDIS_URL)"]
    async fn test_redis_lock_is_exclusive() {
        let lock = RedisLock::connect(&redis_url(), Duration::from_secs(5), DEFAULT_LOCK_OP_TIMEOUT)
            .await
            .expect("Failed to connect to Redis");
        lock.ping().await.expect("Ping failed");

        let client = format!("redis_lock_test_{}", rand::random::<u32>());
        assert!(lock.try_acquire(&client).await.unwrap());
        assert!(!lock.try_acquire(&client).await.unwrap());
        assert!(lock.release(&client).await.unwrap());
        // Already gone
        assert!(!lock.release(&client).await.unwrap());
        assert!(lock.try_acquire(&client).await.unwrap());
        lock.release(&client).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires a running Redis instance (REDIS_URL)"]
    async fn test_redis_lock_expires() {
        let lock = RedisLock::connect(
            &redis_url(),
            Duration::from_millis(200),
            DEFAULT_LOCK_OP_TIMEOUT,
        )
        .await
        .expect("Failed to connect to Redis");

        let client = format!("redis_lock_ttl_{}", rand::random::<u32>());
        assert!(lock.try_acquire(&client).await.unwrap());
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(lock.try_acquire(&client).await.unwrap());
        lock.release(&client).await.unwrap();
    }

    #[test]
    fn test_default_ttl_exceeds_op_timeout() {
        assert!(DEFAULT_LOCK_TTL > DEFAULT_LOCK_OP_TIMEOUT * 4);
    }
}
