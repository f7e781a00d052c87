//! Application state for Axum handlers.

use nexus_core::lock::LockService;
use nexus_core::store::InventoryStore;
use nexus_runtime::RedemptionEngine;
use std::time::Duration;

/// Application state shared across all HTTP handlers.
///
/// Generic over the store and lock backend so tests can run the real router
/// over in-memory doubles.
pub struct AppState<S, L> {
    engine: RedemptionEngine<S, L>,
    lock_mode: &'static str,
    readiness_timeout: Duration,
}

impl<S, L> Clone for AppState<S, L> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            lock_mode: self.lock_mode,
            readiness_timeout: self.readiness_timeout,
        }
    }
}

impl<S, L> AppState<S, L>
where
    S: InventoryStore + 'static,
    L: LockService + 'static,
{
    /// Create state around an engine.
    ///
    /// The reported lock mode defaults to `"enabled"` or `"disabled"`
    /// according to the lock backend.
    #[must_use]
    pub fn new(engine: RedemptionEngine<S, L>) -> Self {
        let lock_mode = if engine.is_lock_enabled() { "enabled" } else { "disabled" };
        Self {
            engine,
            lock_mode,
            readiness_timeout: Duration::from_secs(2),
        }
    }

    /// Override the lock mode reported by `/ready`.
    #[must_use]
    pub const fn with_lock_mode(mut self, lock_mode: &'static str) -> Self {
        self.lock_mode = lock_mode;
        self
    }

    /// Override how long `/ready` waits for the store.
    #[must_use]
    pub const fn with_readiness_timeout(mut self, timeout: Duration) -> Self {
        self.readiness_timeout = timeout;
        self
    }
}

impl<S, L> AppState<S, L> {
    /// The redemption engine.
    #[must_use]
    pub const fn engine(&self) -> &RedemptionEngine<S, L> {
        &self.engine
    }

    /// Lock mode label for readiness reporting.
    #[must_use]
    pub const fn lock_mode(&self) -> &'static str {
        self.lock_mode
    }

    /// Deadline for the readiness store ping.
    #[must_use]
    pub const fn readiness_timeout(&self) -> Duration {
        self.readiness_timeout
    }
}
