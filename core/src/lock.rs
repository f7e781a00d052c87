//! Distributed lock service trait.
//!
//! A [`LockService`] is the backend primitive: one atomic "set if absent
//! with expiry" attempt and a token-checked release. Retrying, deadlines and
//! degraded mode are layered on top by the runtime's lock adapter.
//!
//! # Implementation
//!
//! Use Redis `SET key token NX PX lease` for acquisition and a
//! compare-and-delete script for release.

use crate::error::LockError;
use std::future::Future;
use std::time::Duration;

/// Best-effort distributed mutual exclusion keyed by arbitrary strings.
///
/// # Example
///
/// ```no_run
/// use nexus_core::lock::LockService;
/// use std::time::Duration;
///
/// # async fn example(locks: impl LockService) -> Result<(), Box<dyn std::error::Error>> {
/// if locks.try_acquire("redeem:X1", "owner-token", Duration::from_secs(10)).await? {
///     // ... critical section ...
///     locks.release("redeem:X1", "owner-token").await;
/// }
/// # Ok(())
/// # }
/// ```
pub trait LockService: Send + Sync {
    /// Make a single acquisition attempt.
    ///
    /// The lease self-expires after `lease`, so a crashed holder never blocks
    /// the key forever.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The key is now held by `token`
    /// * `Ok(false)` - The key is held by someone else
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Unavailable`] if the backend cannot be reached.
    fn try_acquire(
        &self,
        key: &str,
        token: &str,
        lease: Duration,
    ) -> impl Future<Output = Result<bool, LockError>> + Send;

    /// Release the key if it is still held by `token`.
    ///
    /// Idempotent. Never fails the caller: backend errors are logged and the
    /// lease expiry cleans up.
    fn release(&self, key: &str, token: &str) -> impl Future<Output = ()> + Send;

    /// `false` for backends that never provide exclusion.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Lock service that always succeeds without providing any exclusion.
///
/// Selected when the real backend is disabled or unreachable at startup.
/// Correctness then rests entirely on the store's atomic operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLockService;

impl LockService for NoopLockService {
    async fn try_acquire(&self, _key: &str, _token: &str, _lease: Duration) -> Result<bool, LockError> {
        Ok(true)
    }

    async fn release(&self, _key: &str, _token: &str) {}

    fn is_enabled(&self) -> bool {
        false
    }
}
