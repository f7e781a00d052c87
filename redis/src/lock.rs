//! Redis implementation of [`LockService`].
//!
//! # Algorithm
//!
//! - **Acquire**: `SET lock:{key} {token} NX PX {lease_ms}`. A nil reply means
//!   another owner holds the key.
//! - **Release**: compare-and-delete in a Lua script, so a holder whose lease
//!   already expired never deletes a successor's lock.
//!
//! Any Redis error on acquire surfaces as [`LockError::Unavailable`]; the
//! runtime's lock adapter turns that into degraded mode.

use nexus_core::error::LockError;
use nexus_core::lock::LockService;
use redis::aio::ConnectionManager;
use redis::{Client, RedisResult};
use std::time::Duration;

/// Key namespace for lock entries.
pub const KEY_PREFIX: &str = "lock:";

const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// Redis-based distributed lock.
///
/// Holds a [`ConnectionManager`], which reconnects on its own after a Redis
/// restart; clones share the same multiplexed connection.
#[derive(Clone)]
pub struct RedisLockService {
    conn_manager: ConnectionManager,
    key_prefix: String,
}

impl RedisLockService {
    /// Connect to Redis.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection URL (e.g., `redis://127.0.0.1:6379`)
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Unavailable`] if the URL is invalid or the
    /// connection cannot be established.
    pub async fn new(redis_url: &str) -> Result<Self, LockError> {
        let client = Client::open(redis_url)
            .map_err(|e| LockError::Unavailable(format!("Failed to create Redis client: {e}")))?;

        let conn_manager = ConnectionManager::new(client)
            .await
            .map_err(|e| LockError::Unavailable(format!("Failed to connect to Redis: {e}")))?;

        Ok(Self::from_manager(conn_manager))
    }

    /// Wrap an existing connection manager.
    #[must_use]
    pub fn from_manager(conn_manager: ConnectionManager) -> Self {
        Self {
            conn_manager,
            key_prefix: KEY_PREFIX.to_string(),
        }
    }

    /// Round-trip a `PING`.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Unavailable`] if Redis does not answer.
    pub async fn ping(&self) -> Result<(), LockError> {
        let mut conn = self.conn_manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| LockError::Unavailable(format!("Failed to ping Redis: {e}")))?;
        Ok(())
    }

    /// The namespaced Redis key for a lock key.
    #[must_use]
    pub fn redis_key(&self, key: &str) -> String {
        format!("{}{key}", self.key_prefix)
    }
}

/// Lease in whole milliseconds, at least one.
fn lease_millis(lease: Duration) -> u64 {
    u64::try_from(lease.as_millis()).unwrap_or(u64::MAX).max(1)
}

impl LockService for RedisLockService {
    async fn try_acquire(&self, key: &str, token: &str, lease: Duration) -> Result<bool, LockError> {
        let mut conn = self.conn_manager.clone();
        let redis_key = self.redis_key(key);

        let reply: Option<String> = redis::cmd("SET")
            .arg(&redis_key)
            .arg(token)
            .arg("NX")
            .arg("PX")
            .arg(lease_millis(lease))
            .query_async(&mut conn)
            .await
            .map_err(|e| LockError::Unavailable(format!("Failed to acquire lock: {e}")))?;

        Ok(reply.is_some())
    }

    async fn release(&self, key: &str, token: &str) {
        let mut conn = self.conn_manager.clone();
        let redis_key = self.redis_key(key);

        let script = redis::Script::new(RELEASE_SCRIPT);
        let result: RedisResult<i64> = script
            .key(&redis_key)
            .arg(token)
            .invoke_async(&mut conn)
            .await;

        match result {
            Ok(0) => tracing::debug!(key = %redis_key, "Lock already expired or taken over"),
            Ok(_) => tracing::trace!(key = %redis_key, "Lock released"),
            Err(e) => tracing::warn!(key = %redis_key, error = %e, "Failed to release lock; lease will expire"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lease_millis() {
        assert_eq!(lease_millis(Duration::from_secs(10)), 10_000);
        assert_eq!(lease_millis(Duration::from_micros(10)), 1);
        assert_eq!(lease_millis(Duration::MAX), u64::MAX);
    }
}
