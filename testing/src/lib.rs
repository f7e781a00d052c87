//! # Nexus Testing
//!
//! Testing utilities and helpers for the redemption system.
//!
//! This crate provides:
//! - Deterministic clocks
//! - An in-memory inventory store with failure and contention injection
//! - An in-memory lock service with leases, foreign holders and outages
//! - Fixtures and proptest strategies for domain types
//!
//! ## Example
//!
//! ```ignore
//! use nexus_testing::{InMemoryInventoryStore, InMemoryLockService, test_clock};
//!
//! #[tokio::test]
//! async fn test_first_use_assigns() {
//!     let store = Arc::new(InMemoryInventoryStore::new());
//!     let pool = store.seed_pool("A");
//!     store.seed_items(pool.id, 1);
//!     store.seed_code("X1", pool.id, None);
//!
//!     let engine = RedemptionEngine::new(store, Arc::new(InMemoryLockService::new()), Arc::new(test_clock()), EngineConfig::default());
//!     assert_eq!(engine.redeem("x1").await?.view_count, 1);
//! }
//! ```

use chrono::{DateTime, Utc};
use nexus_core::environment::Clock;

pub mod inventory;
pub mod locks;

/// Mock implementations of Environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Mutex, PoisonError};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use nexus_testing::mocks::FixedClock;
    /// use nexus_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when told to.
    ///
    /// ```
    /// use nexus_testing::mocks::ManualClock;
    /// use nexus_testing::test_time;
    /// use nexus_core::environment::Clock;
    ///
    /// let clock = ManualClock::new(test_time());
    /// clock.advance(chrono::Duration::days(2));
    /// assert_eq!(clock.now(), test_time() + chrono::Duration::days(2));
    /// ```
    #[derive(Debug)]
    pub struct ManualClock {
        time: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        /// Start at `time`.
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Mutex::new(time),
            }
        }

        /// Move the clock forward.
        pub fn advance(&self, by: chrono::Duration) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }

        /// Jump to `time`.
        pub fn set(&self, time: DateTime<Utc>) {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner) = time;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// The instant every fixture is stamped with (2025-01-01 00:00:00 UTC).
    #[must_use]
    pub fn test_time() -> DateTime<Utc> {
        DateTime::from_timestamp(1_735_689_600, 0).unwrap_or_default()
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(test_time())
    }
}

/// Fixtures.
pub mod helpers {
    use nexus_core::AccountPayload;

    /// Complete payload number `n`.
    #[must_use]
    pub fn payload(n: usize) -> AccountPayload {
        AccountPayload::new(format!("user-{n}@example.com"), format!("secret-{n}"))
    }

    /// Complete payload number `n` with a TOTP secret.
    #[must_use]
    pub fn payload_with_totp(n: usize) -> AccountPayload {
        payload(n).with_totp_secret(format!("TOTP{n:04}"))
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use nexus_core::AccountPayload;
    use proptest::prelude::*;

    /// Raw code strings as a user might type them: mixed case, padded.
    pub fn raw_code() -> impl Strategy<Value = String> {
        ("[ \t]{0,3}", "[a-zA-Z2-9]{1,16}", "[ \t\n]{0,3}").prop_map(|(lead, body, tail)| format!("{lead}{body}{tail}"))
    }

    /// Payloads with non-empty account and password.
    pub fn complete_payload() -> impl Strategy<Value = AccountPayload> {
        ("[a-z]{1,12}@[a-z]{1,8}\\.com", "[!-~]{1,24}", proptest::option::of("[A-Z2-7]{16}")).prop_map(
            |(account, password, totp)| {
                let payload = AccountPayload::new(account, password);
                match totp {
                    Some(secret) => payload.with_totp_secret(secret),
                    None => payload,
                }
            },
        )
    }
}

// Re-export commonly used items
pub use inventory::{InMemoryInventoryStore, StoreSnapshot};
pub use locks::InMemoryLockService;
pub use mocks::{FixedClock, ManualClock, test_clock, test_time};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.now().to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_manual_clock_moves_only_when_told() {
        let clock = ManualClock::new(test_time());
        assert_eq!(clock.now(), test_time());
        clock.advance(chrono::Duration::seconds(30));
        assert_eq!(clock.now(), test_time() + chrono::Duration::seconds(30));
        clock.set(test_time());
        assert_eq!(clock.now(), test_time());
    }

    #[test]
    fn test_payload_fixtures_are_complete() {
        assert!(helpers::payload(1).is_complete());
        assert_eq!(helpers::payload_with_totp(7).totp_secret.as_deref(), Some("TOTP0007"));
    }
}
