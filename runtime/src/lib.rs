//! # Nexus Runtime
//!
//! Runtime pieces of the redemption system.
//!
//! ## Core Components
//!
//! - **Redemption Engine**: normalize, lock, load, then assign or replay
//! - **Distributed Lock**: bounded retry, deadlines and degraded mode over a lock backend
//! - **Catalog Service**: validated pool, inventory and code administration
//!
//! ## Example
//!
//! ```ignore
//! use nexus_runtime::engine::{EngineConfig, RedemptionEngine};
//! use nexus_core::environment::SystemClock;
//!
//! let engine = RedemptionEngine::new(store, locks, Arc::new(SystemClock), EngineConfig::default());
//!
//! let first = engine.redeem("x1").await?;
//! let again = engine.redeem("X1").await?;
//! assert_eq!(first.account, again.account);
//! assert_eq!(again.view_count, 2);
//! ```

/// Code redemption decision procedure
pub mod engine;

/// Retrying, degrading lock adapter
pub mod lock;

/// Fixed-interval and exponential retry schedules
pub mod retry;

/// Pool, inventory and code administration
pub mod catalog;

/// Prometheus metrics for observability
pub mod metrics;

pub use catalog::CatalogService;
pub use engine::{EngineConfig, RedemptionEngine, RedemptionPath};
pub use lock::{AcquireError, DistributedLock, LockGuard, LockSettings};
pub use retry::RetryPolicy;
