//! # Nexus Core
//!
//! Domain types and dependency traits for single-use redemption codes.
//!
//! A redemption code claims exactly one inventory item from its pool. The
//! first successful redemption binds an item to the code; every later
//! redemption replays the same item and bumps the code's view counter.
//!
//! ## Core Concepts
//!
//! - **Pool**: named partition of inventory and codes
//! - **Inventory item**: one credential bundle, handed out at most once
//! - **Redemption code**: claim ticket, unused until its first redemption
//! - **Lock service**: best-effort per-code mutual exclusion
//! - **Inventory store**: the transactional source of truth
//!
//! ## Architecture Principles
//!
//! - The store is the final backstop: reservation and binding are one commit
//! - The lock only serializes attempts on the same code
//! - All external dependencies are traits injected at construction
//!
//! ## Example
//!
//! ```ignore
//! use nexus_core::{code, RedemptionResult};
//!
//! let engine = RedemptionEngine::new(store, locks, clock, EngineConfig::default());
//! let result: RedemptionResult = engine.redeem("  x1 ").await?;
//! assert_eq!(result.view_count, 1);
//! ```

#![forbid(unsafe_code)]

pub mod catalog;
pub mod code;
pub mod error;
pub mod lock;
pub mod projector;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use error::{CatalogError, LockError, RedeemError, StoreError};
pub use projector::RedemptionResult;
pub use types::{
    AccountPayload, CodeId, CodeStatus, InventoryItem, ItemId, ItemStatus, Pool, PoolId,
    RedemptionCode,
};

/// Environment module - Dependency injection traits
///
/// All sources of nondeterminism the engine needs are abstracted behind
/// traits and injected at construction.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use nexus_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let before = clock.now();
    /// assert!(clock.now() >= before);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
