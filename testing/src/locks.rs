//! In-memory lock service.
//!
//! Leases are measured with `tokio::time::Instant`.

use nexus_core::LockError;
use nexus_core::lock::LockService;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Token used by [`InMemoryLockService::hold`].
pub const FOREIGN_TOKEN: &str = "foreign-holder";

#[derive(Debug)]
struct Lease {
    token: String,
    expires_at: Instant,
}

/// Set-if-absent lock with expiring leases and an outage switch.
#[derive(Debug, Default)]
pub struct InMemoryLockService {
    leases: Mutex<HashMap<String, Lease>>,
    unreachable: AtomicBool,
    attempts: AtomicUsize,
    releases: AtomicUsize,
}

impl InMemoryLockService {
    /// Create an empty lock service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn leases(&self) -> MutexGuard<'_, HashMap<String, Lease>> {
        self.leases.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Simulate an outage: every call fails as unavailable until switched back.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Take `key` on behalf of some other process for `lease`.
    pub fn hold(&self, key: &str, lease: Duration) {
        self.leases().insert(
            key.to_string(),
            Lease {
                token: FOREIGN_TOKEN.to_string(),
                expires_at: Instant::now() + lease,
            },
        );
    }

    /// Drop whatever lease exists on `key`.
    pub fn clear(&self, key: &str) {
        self.leases().remove(key);
    }

    /// Whether `key` currently has a live lease.
    #[must_use]
    pub fn is_held(&self, key: &str) -> bool {
        self.leases()
            .get(key)
            .is_some_and(|lease| lease.expires_at > Instant::now())
    }

    /// Acquisition attempts seen so far.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Successful token-matched releases so far.
    #[must_use]
    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

impl LockService for InMemoryLockService {
    async fn try_acquire(&self, key: &str, token: &str, lease: Duration) -> Result<bool, LockError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(LockError::Unavailable("in-memory lock switched off".into()));
        }

        let now = Instant::now();
        let mut leases = self.leases();
        if leases.get(key).is_some_and(|existing| existing.expires_at > now) {
            return Ok(false);
        }
        leases.insert(
            key.to_string(),
            Lease {
                token: token.to_string(),
                expires_at: now + lease,
            },
        );
        Ok(true)
    }

    async fn release(&self, key: &str, token: &str) {
        if self.unreachable.load(Ordering::SeqCst) {
            return;
        }
        let mut leases = self.leases();
        if leases.get(key).is_some_and(|lease| lease.token == token) {
            leases.remove(key);
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}
