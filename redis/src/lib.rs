//! Redis distributed lock for Nexus.
//!
//! Provides [`RedisLockService`], a [`LockService`](nexus_core::lock::LockService)
//! built on `SET NX PX` with a compare-and-delete release, and
//! [`LockBackend`], which picks Redis or no lock at startup.
//!
//! # Example
//!
//! ```no_run
//! use nexus_redis::LockBackend;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let locks = LockBackend::connect(Some("redis://127.0.0.1:6379"), Duration::from_secs(2), true).await;
//! println!("lock mode: {}", locks.mode());
//! # }
//! ```

pub mod backend;
pub mod lock;

pub use backend::LockBackend;
pub use lock::RedisLockService;
