//! Lock adapter: bounded retry, deadlines and degraded mode on top of a
//! [`LockService`].
//!
//! [`DistributedLock::acquire`] polls the backend until it wins the key, the
//! retry budget runs out, or the caller's deadline passes. If the backend
//! cannot be reached the adapter degrades: acquisition succeeds immediately
//! without exclusion and the guard's release does nothing. Degraded
//! acquisitions are logged and counted separately from contention so the two
//! stay distinguishable.
//!
//! # Example
//!
//! ```no_run
//! use nexus_core::lock::NoopLockService;
//! use nexus_runtime::lock::{DistributedLock, LockSettings};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let lock = DistributedLock::new(Arc::new(NoopLockService), LockSettings::default());
//! let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
//! let guard = lock.acquire("redeem:X1", deadline).await?;
//! // ... critical section ...
//! guard.release().await;
//! # Ok(())
//! # }
//! ```

use crate::metrics::LockMetrics;
use crate::retry::RetryPolicy;
use nexus_core::LockError;
use nexus_core::lock::LockService;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Upper bound on a single release call. The lease expiry covers anything
/// slower.
const RELEASE_TIMEOUT: Duration = Duration::from_secs(1);

/// Lease and retry configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LockSettings {
    /// Lifetime of a held key if never released
    pub lease: Duration,
    /// Polling schedule while the key is contended
    pub retry: RetryPolicy,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            lease: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }
}

/// Acquisition gave up. Both variants surface as `Busy` to callers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AcquireError {
    /// The key stayed held for the whole retry budget.
    #[error("Lock {key} still held after {attempts} attempt(s)")]
    Contended {
        /// Lock key
        key: String,
        /// Attempts made
        attempts: usize,
    },

    /// The caller's deadline passed before the key was won.
    #[error("Deadline passed while waiting for lock {key}")]
    DeadlineExceeded {
        /// Lock key
        key: String,
    },
}

/// Retrying, degrading wrapper around a [`LockService`].
pub struct DistributedLock<L> {
    service: Arc<L>,
    settings: LockSettings,
}

impl<L> Clone for DistributedLock<L> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            settings: self.settings.clone(),
        }
    }
}

impl<L: LockService + 'static> DistributedLock<L> {
    /// Wrap a lock service.
    #[must_use]
    pub const fn new(service: Arc<L>, settings: LockSettings) -> Self {
        Self { service, settings }
    }

    /// Settings in effect.
    #[must_use]
    pub const fn settings(&self) -> &LockSettings {
        &self.settings
    }

    /// Whether the backend provides exclusion at all.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.service.is_enabled()
    }

    /// Acquire `key`, retrying on contention until the retry budget or
    /// `deadline` is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`AcquireError`] if the key could not be won. An unreachable
    /// backend is not an error: a degraded guard is returned instead.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn acquire(&self, key: &str, deadline: Instant) -> Result<LockGuard<L>, AcquireError> {
        let token = uuid::Uuid::new_v4().to_string();
        let max_attempts = self.settings.retry.max_attempts.max(1);

        for attempt in 0..max_attempts {
            let outcome = tokio::time::timeout_at(
                deadline,
                self.service.try_acquire(key, &token, self.settings.lease),
            )
            .await;

            match outcome {
                Ok(Ok(true)) => {
                    tracing::debug!(key, attempts = attempt + 1, "Lock acquired");
                    return Ok(LockGuard::held(Arc::clone(&self.service), key, token));
                },
                Ok(Ok(false)) => {},
                Ok(Err(LockError::Unavailable(reason))) => {
                    tracing::warn!(
                        key,
                        reason = %reason,
                        "Lock service unreachable, proceeding without mutual exclusion"
                    );
                    LockMetrics::record_degraded();
                    return Ok(LockGuard::degraded(key));
                },
                Err(_elapsed) => {
                    return Err(self.give_up(AcquireError::DeadlineExceeded { key: key.to_string() }));
                },
            }

            if attempt + 1 == max_attempts {
                break;
            }

            if !self.settings.retry.sleep_fits_before(attempt, deadline) {
                return Err(self.give_up(AcquireError::DeadlineExceeded { key: key.to_string() }));
            }

            tokio::time::sleep(self.settings.retry.delay_for_attempt(attempt)).await;
        }

        Err(self.give_up(AcquireError::Contended {
            key: key.to_string(),
            attempts: max_attempts,
        }))
    }

    fn give_up(&self, error: AcquireError) -> AcquireError {
        tracing::info!(error = %error, lease = ?self.settings.lease, "Lock acquisition gave up");
        LockMetrics::record_busy();
        error
    }
}

/// Proof of acquisition.
///
/// Call [`LockGuard::release`] on every path. A guard dropped without release
/// (for example when the owning future is cancelled) schedules the release on
/// the current runtime, if there is one; otherwise the lease expiry frees the
/// key.
#[must_use = "a lock guard must be released"]
pub struct LockGuard<L: LockService + 'static> {
    key: String,
    held: Option<(Arc<L>, String)>,
}

impl<L: LockService + 'static> LockGuard<L> {
    fn held(service: Arc<L>, key: &str, token: String) -> Self {
        Self {
            key: key.to_string(),
            held: Some((service, token)),
        }
    }

    fn degraded(key: &str) -> Self {
        Self {
            key: key.to_string(),
            held: None,
        }
    }

    /// The locked key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// `true` if acquisition proceeded without exclusion.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        self.held.is_none()
    }

    /// Release the key. Never fails: errors and timeouts are logged.
    pub async fn release(mut self) {
        if let Some((service, token)) = self.held.take() {
            release_bounded(&*service, &self.key, &token).await;
        }
    }
}

impl<L: LockService + 'static> Drop for LockGuard<L> {
    fn drop(&mut self) {
        let Some((service, token)) = self.held.take() else {
            return;
        };
        let key = std::mem::take(&mut self.key);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    release_bounded(&*service, &key, &token).await;
                });
            },
            Err(_) => {
                tracing::warn!(key = %key, "Lock guard dropped outside a runtime, leaving key to expire");
            },
        }
    }
}

async fn release_bounded<L: LockService>(service: &L, key: &str, token: &str) {
    if tokio::time::timeout(RELEASE_TIMEOUT, service.release(key, token))
        .await
        .is_err()
    {
        tracing::warn!(key, "Lock release timed out, leaving key to expire");
    }
}

#[cfg(test)]
#[allow(clippy::panic)] // Tests are allowed to panic on failures
mod tests {
    use super::*;
    use nexus_core::lock::NoopLockService;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Lock that reports contention a fixed number of times, then grants.
    struct FlakyLock {
        busy_for: usize,
        calls: AtomicUsize,
        releases: AtomicUsize,
    }

    impl FlakyLock {
        fn new(busy_for: usize) -> Self {
            Self {
                busy_for,
                calls: AtomicUsize::new(0),
                releases: AtomicUsize::new(0),
            }
        }
    }

    impl LockService for FlakyLock {
        async fn try_acquire(&self, _key: &str, _token: &str, _lease: Duration) -> Result<bool, LockError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(call >= self.busy_for)
        }

        async fn release(&self, _key: &str, _token: &str) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct DownLock;

    impl LockService for DownLock {
        async fn try_acquire(&self, _key: &str, _token: &str, _lease: Duration) -> Result<bool, LockError> {
            Err(LockError::Unavailable("connection refused".into()))
        }

        async fn release(&self, _key: &str, _token: &str) {}
    }

    fn fast_settings(attempts: usize) -> LockSettings {
        LockSettings {
            lease: Duration::from_secs(10),
            retry: RetryPolicy::fixed(attempts, Duration::from_millis(5)),
        }
    }

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(5)
    }

    #[tokio::test]
    async fn test_acquire_retries_until_granted() {
        let service = Arc::new(FlakyLock::new(3));
        let lock = DistributedLock::new(Arc::clone(&service), fast_settings(10));

        let guard = lock.acquire("redeem:A", far_deadline()).await;
        let Ok(guard) = guard else {
            panic!("expected lock to be acquired");
        };
        assert!(!guard.is_degraded());
        assert_eq!(guard.key(), "redeem:A");
        guard.release().await;

        assert_eq!(service.calls.load(Ordering::SeqCst), 4);
        assert_eq!(service.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_acquire_gives_up_after_budget() {
        let service = Arc::new(FlakyLock::new(usize::MAX));
        let lock = DistributedLock::new(Arc::clone(&service), fast_settings(4));

        let result = lock.acquire("redeem:A", far_deadline()).await;
        assert_eq!(
            result.err(),
            Some(AcquireError::Contended {
                key: "redeem:A".into(),
                attempts: 4
            })
        );
        assert_eq!(service.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_acquire_stops_at_deadline() {
        let service = Arc::new(FlakyLock::new(usize::MAX));
        let settings = LockSettings {
            lease: Duration::from_secs(10),
            retry: RetryPolicy::fixed(1000, Duration::from_millis(20)),
        };
        let lock = DistributedLock::new(service, settings);

        let started = Instant::now();
        let result = lock
            .acquire("redeem:A", Instant::now() + Duration::from_millis(100))
            .await;
        assert!(matches!(result, Err(AcquireError::DeadlineExceeded { .. })));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_unreachable_backend_degrades() {
        let lock = DistributedLock::new(Arc::new(DownLock), fast_settings(3));
        let result = lock.acquire("redeem:A", far_deadline()).await;
        let Ok(guard) = result else {
            panic!("degraded acquisition must succeed");
        };
        assert!(guard.is_degraded());
        guard.release().await;
    }

    #[tokio::test]
    async fn test_dropped_guard_releases_in_background() {
        let service = Arc::new(FlakyLock::new(0));
        let lock = DistributedLock::new(Arc::clone(&service), fast_settings(1));

        let guard = lock.acquire("redeem:A", far_deadline()).await;
        drop(guard);

        for _ in 0..50 {
            if service.releases.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert_eq!(service.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_noop_backend_is_reported_disabled() {
        let lock = DistributedLock::new(Arc::new(NoopLockService), LockSettings::default());
        assert!(!lock.is_enabled());
        let guard = lock.acquire("k", far_deadline()).await;
        assert!(guard.is_ok());
        if let Ok(guard) = guard {
            guard.release().await;
        }
    }
}
