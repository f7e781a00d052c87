//! The redemption engine.
//!
//! One call to [`RedemptionEngine::redeem`] runs the whole decision procedure
//! for a code:
//!
//! ```text
//! normalize ─▶ lock ─▶ load ─┬─▶ active ─▶ record replay view ─┐
//!                            └─▶ unused ─▶ find item ─▶ reserve ┴─▶ release ─▶ project
//! ```
//!
//! The per-code lock serializes attempts on the same code. Races between
//! different codes for the same item are settled by the store's conditional
//! reservation, which falls back to another free item of the pool when the
//! candidate is gone. It is also the backstop when the lock runs degraded.

use crate::lock::{DistributedLock, LockSettings};
use crate::metrics::RedemptionMetrics;
use nexus_core::environment::Clock;
use nexus_core::lock::LockService;
use nexus_core::store::{CodeRecord, InventoryStore, ReserveOutcome};
use nexus_core::{RedeemError, RedemptionResult, StoreError, code};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Lock lease and retry schedule
    pub lock: LockSettings,
    /// Deadline applied by [`RedemptionEngine::redeem`]
    pub request_timeout: Duration,
    /// Items tried before giving up when reservations keep losing races
    pub max_reservation_attempts: usize,
    /// Whether a bound code keeps replaying after its expiry
    pub replay_after_expiry: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock: LockSettings::default(),
            request_timeout: Duration::from_secs(5),
            max_reservation_attempts: 8,
            replay_after_expiry: true,
        }
    }
}

/// Which branch a successful redemption took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedemptionPath {
    /// First use: an item was reserved and bound.
    Assigned,
    /// Repeat use: the bound item was returned again.
    Replayed,
}

impl RedemptionPath {
    /// Metric label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Assigned => "assigned",
            Self::Replayed => "replayed",
        }
    }
}

/// Lock key for a normalized code.
#[must_use]
pub fn lock_key(normalized_code: &str) -> String {
    format!("redeem:{normalized_code}")
}

/// Redeems codes against an [`InventoryStore`] under a per-code lock.
pub struct RedemptionEngine<S, L> {
    store: Arc<S>,
    lock: DistributedLock<L>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl<S, L> Clone for RedemptionEngine<S, L> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            lock: self.lock.clone(),
            clock: Arc::clone(&self.clock),
            config: self.config.clone(),
        }
    }
}

impl<S, L> RedemptionEngine<S, L>
where
    S: InventoryStore + 'static,
    L: LockService + 'static,
{
    /// Create an engine over the given store, lock backend and clock.
    #[must_use]
    pub fn new(store: Arc<S>, locks: Arc<L>, clock: Arc<dyn Clock>, config: EngineConfig) -> Self {
        let lock = DistributedLock::new(locks, config.lock.clone());
        Self {
            store,
            lock,
            clock,
            config,
        }
    }

    /// The backing store.
    #[must_use]
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Configuration in effect.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether redemptions run under real mutual exclusion.
    #[must_use]
    pub fn is_lock_enabled(&self) -> bool {
        self.lock.is_enabled()
    }

    /// Redeem `raw` with the configured request timeout as deadline.
    ///
    /// # Errors
    ///
    /// See [`RedemptionEngine::redeem_until`].
    pub async fn redeem(&self, raw: &str) -> Result<RedemptionResult, RedeemError> {
        let deadline = Instant::now() + self.config.request_timeout;
        self.redeem_until(raw, deadline).await
    }

    /// Redeem `raw`, giving up once `deadline` passes.
    ///
    /// # Errors
    ///
    /// - [`RedeemError::InvalidInput`] if the code is blank
    /// - [`RedeemError::NotFound`] if no such code exists
    /// - [`RedeemError::Expired`] if the code is unused and past its expiry
    /// - [`RedeemError::OutOfStock`] if the code's pool has nothing left
    /// - [`RedeemError::Busy`] if the lock could not be won in time
    /// - [`RedeemError::Store`] if the store failed or timed out
    #[tracing::instrument(skip(self, raw), fields(code = tracing::field::Empty))]
    pub async fn redeem_until(&self, raw: &str, deadline: Instant) -> Result<RedemptionResult, RedeemError> {
        let started = std::time::Instant::now();
        let result = self.run(raw, deadline).await;

        match &result {
            Ok((_, path)) => RedemptionMetrics::record(path.as_str(), started.elapsed()),
            Err(error) => {
                tracing::debug!(error = %error, kind = error.kind(), "Redemption failed");
                RedemptionMetrics::record(error.kind(), started.elapsed());
            },
        }

        result.map(|(payload, _)| payload)
    }

    async fn run(&self, raw: &str, deadline: Instant) -> Result<(RedemptionResult, RedemptionPath), RedeemError> {
        let code = code::normalize(raw);
        if code.is_empty() {
            return Err(RedeemError::invalid_input("code must not be empty"));
        }
        tracing::Span::current().record("code", code.as_str());

        let guard = self
            .lock
            .acquire(&lock_key(&code), deadline)
            .await
            .map_err(|_| RedeemError::Busy)?;
        let degraded = guard.is_degraded();

        let result = self.redeem_locked(&code, deadline).await;
        guard.release().await;

        if let Ok((payload, path)) = &result {
            tracing::info!(
                code = %code,
                path = path.as_str(),
                view_count = payload.view_count,
                lock_degraded = degraded,
                "Code redeemed"
            );
        }
        result
    }

    async fn redeem_locked(
        &self,
        code: &str,
        deadline: Instant,
    ) -> Result<(RedemptionResult, RedemptionPath), RedeemError> {
        let record = bounded(deadline, self.store.get_by_code(code))
            .await?
            .ok_or(RedeemError::NotFound)?;

        if record.code.is_active() {
            return self.replay(record, deadline).await;
        }

        if record.code.is_expired_at(self.clock.now()) {
            return Err(RedeemError::Expired);
        }

        self.assign(record, deadline).await
    }

    async fn replay(
        &self,
        record: CodeRecord,
        deadline: Instant,
    ) -> Result<(RedemptionResult, RedemptionPath), RedeemError> {
        let now = self.clock.now();
        if !self.config.replay_after_expiry && record.code.is_expired_at(now) {
            return Err(RedeemError::Expired);
        }

        let Some(item) = record.item else {
            return Err(StoreError::Inconsistent(format!("active code {} has no bound item", record.code.id)).into());
        };

        let code = bounded(deadline, self.store.record_replay_view(record.code.id, now))
            .await?
            .ok_or_else(|| StoreError::Inconsistent(format!("code {} is no longer active", record.code.id)))?;

        tracing::debug!(item_id = %item.id, view_count = code.view_count, "Replayed bound item");
        Ok((
            RedemptionResult::project(&item, &code, &record.pool_name),
            RedemptionPath::Replayed,
        ))
    }

    async fn assign(
        &self,
        record: CodeRecord,
        deadline: Instant,
    ) -> Result<(RedemptionResult, RedemptionPath), RedeemError> {
        let pool_id = record.code.pool_id;

        for attempt in 0..self.config.max_reservation_attempts.max(1) {
            let Some(candidate) = bounded(deadline, self.store.find_unused_redeemable(pool_id))
                .await?
            else {
                tracing::info!(pool_id = %pool_id, "Pool is out of stock");
                return Err(RedeemError::OutOfStock);
            };

            let now = self.clock.now();
            let outcome = bounded(deadline, self.store.reserve_and_bind(candidate.id, record.code.id, now))
                .await?;

            match outcome {
                ReserveOutcome::Reserved { item, code } => {
                    tracing::debug!(item_id = %item.id, pool_id = %pool_id, attempt, "Item bound to code");
                    return Ok((
                        RedemptionResult::project(&item, &code, &record.pool_name),
                        RedemptionPath::Assigned,
                    ));
                },
                ReserveOutcome::ItemTaken => {
                    tracing::debug!(item_id = %candidate.id, attempt, "No item could be claimed, looking again");
                    RedemptionMetrics::record_conflict("item_taken");
                },
                ReserveOutcome::CodeAlreadyBound => {
                    tracing::warn!(code = %record.code.code, "Code bound concurrently, replaying");
                    RedemptionMetrics::record_conflict("code_already_bound");
                    let reloaded = bounded(deadline, self.store.get_by_code(&record.code.code))
                        .await?
                        .ok_or(RedeemError::NotFound)?;
                    if !reloaded.code.is_active() {
                        return Err(StoreError::Inconsistent(format!(
                            "code {} reported bound but is not active",
                            reloaded.code.id
                        ))
                        .into());
                    }
                    return self.replay(reloaded, deadline).await;
                },
            }
        }

        tracing::warn!(
            pool_id = %pool_id,
            attempts = self.config.max_reservation_attempts,
            "Every reservation attempt lost a race"
        );
        Err(RedeemError::Busy)
    }
}

/// Run a store call against the request deadline.
async fn bounded<T>(
    deadline: Instant,
    operation: impl Future<Output = Result<T, StoreError>> + Send,
) -> Result<T, RedeemError> {
    match tokio::time::timeout_at(deadline, operation).await {
        Ok(result) => result.map_err(RedeemError::from),
        Err(_) => {
            tracing::warn!("Store call did not finish before the deadline");
            Err(StoreError::Timeout.into())
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_key_is_per_code() {
        assert_eq!(lock_key("X1"), "redeem:X1");
        assert_ne!(lock_key("X1"), lock_key("X2"));
    }

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.max_reservation_attempts, 8);
        assert!(config.replay_after_expiry);
        assert_eq!(config.lock.lease, Duration::from_secs(10));
    }
}
