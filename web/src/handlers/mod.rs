//! HTTP request handlers.

pub mod health;
pub mod redeem;

pub use health::{health_check, readiness_check};
pub use redeem::redeem;
