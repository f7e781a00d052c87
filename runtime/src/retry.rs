//! Retry schedule for lock acquisition.
//!
//! A contended lock is polled up to `max_attempts` times with a delay between
//! attempts. The default schedule is a fixed 100ms interval over 30 attempts,
//! roughly a 3 second ceiling; a multiplier above 1.0 turns it into
//! exponential backoff capped at `max_delay`.
//!
//! # Example
//!
//! ```rust
//! use nexus_runtime::retry::RetryPolicy;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::builder()
//!     .max_attempts(30)
//!     .initial_delay(Duration::from_millis(100))
//!     .build();
//!
//! assert_eq!(policy.delay_for_attempt(7), Duration::from_millis(100));
//! ```

use std::time::Duration;
use tokio::time::Instant;

/// Retry policy configuration.
///
/// # Default Values
///
/// - `max_attempts`: 30
/// - `initial_delay`: 100ms
/// - `max_delay`: 1 second
/// - `multiplier`: 1.0 (fixed interval)
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, the first one included
    pub max_attempts: usize,
    /// Delay after the first failed attempt
    pub initial_delay: Duration,
    /// Cap for the delay between attempts
    pub max_delay: Duration,
    /// Growth factor applied per attempt
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            multiplier: 1.0,
        }
    }
}

impl RetryPolicy {
    /// Create a new policy builder.
    #[must_use]
    pub const fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder {
            max_attempts: None,
            initial_delay: None,
            max_delay: None,
            multiplier: None,
        }
    }

    /// Fixed-interval policy.
    #[must_use]
    pub fn fixed(max_attempts: usize, interval: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay: interval,
            max_delay: interval,
            multiplier: 1.0,
        }
    }

    /// Calculate delay after a given (zero-based) failed attempt.
    ///
    /// delay = `initial_delay` * (`multiplier` ^ attempt), capped at `max_delay`.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_possible_wrap
    )] // Delays are small; saturating float math is fine
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        if attempt == 0 || (self.multiplier - 1.0).abs() < f64::EPSILON {
            return self.initial_delay;
        }

        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay_ms = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let delay = Duration::from_millis(delay_ms.min(u64::MAX as f64) as u64);

        delay.min(self.max_delay)
    }

    /// Upper bound of total time spent sleeping if every attempt fails.
    #[must_use]
    pub fn total_wait_ceiling(&self) -> Duration {
        (0..self.max_attempts.saturating_sub(1))
            .map(|attempt| self.delay_for_attempt(attempt))
            .sum()
    }

    /// Whether sleeping for the delay after `attempt` still ends before `deadline`.
    #[must_use]
    pub fn sleep_fits_before(&self, attempt: usize, deadline: Instant) -> bool {
        Instant::now() + self.delay_for_attempt(attempt) < deadline
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    max_attempts: Option<usize>,
    initial_delay: Option<Duration>,
    max_delay: Option<Duration>,
    multiplier: Option<f64>,
}

impl RetryPolicyBuilder {
    /// Set maximum number of attempts.
    #[must_use]
    pub const fn max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Set the delay after the first failed attempt.
    #[must_use]
    pub const fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = Some(delay);
        self
    }

    /// Set maximum delay (cap for exponential backoff).
    #[must_use]
    pub const fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    /// Set multiplier for exponential backoff.
    #[must_use]
    pub const fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = Some(multiplier);
        self
    }

    /// Build the [`RetryPolicy`].
    #[must_use]
    pub fn build(self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        let initial_delay = self.initial_delay.unwrap_or(defaults.initial_delay);
        RetryPolicy {
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts).max(1),
            initial_delay,
            max_delay: self.max_delay.unwrap_or_else(|| defaults.max_delay.max(initial_delay)),
            multiplier: self.multiplier.unwrap_or(defaults.multiplier),
        }
    }
}
