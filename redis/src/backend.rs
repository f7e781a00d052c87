//! Startup selection between the Redis lock and no lock at all.

use crate::lock::RedisLockService;
use nexus_core::error::LockError;
use nexus_core::lock::{LockService, NoopLockService};
use std::time::Duration;

/// The lock backend chosen at startup.
///
/// `Disabled` is picked when locking is switched off, no Redis URL is
/// configured, or Redis does not answer within the connect timeout. The
/// choice is not revisited while the process runs; per-request outages are
/// handled by the runtime's degraded mode instead.
#[derive(Clone)]
pub enum LockBackend {
    /// Exclusion through Redis.
    Redis(RedisLockService),
    /// No exclusion; the store's atomic operations carry correctness.
    Disabled(NoopLockService),
}

impl LockBackend {
    /// Select a backend.
    ///
    /// Never fails: every problem downgrades to [`LockBackend::Disabled`] with
    /// a warning.
    pub async fn connect(redis_url: Option<&str>, connect_timeout: Duration, enabled: bool) -> Self {
        if !enabled {
            tracing::info!("Distributed lock disabled by configuration");
            return Self::Disabled(NoopLockService);
        }

        let Some(url) = redis_url.filter(|url| !url.trim().is_empty()) else {
            tracing::warn!("No Redis URL configured, running without distributed lock");
            return Self::Disabled(NoopLockService);
        };

        match tokio::time::timeout(connect_timeout, probe(url)).await {
            Ok(Ok(service)) => {
                tracing::info!("Distributed lock connected to Redis");
                Self::Redis(service)
            },
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Redis unreachable, running without distributed lock");
                Self::Disabled(NoopLockService)
            },
            Err(_) => {
                tracing::warn!(
                    timeout_ms = connect_timeout.as_millis(),
                    "Redis connect timed out, running without distributed lock"
                );
                Self::Disabled(NoopLockService)
            },
        }
    }

    /// `"redis"` or `"disabled"`, for health reporting.
    #[must_use]
    pub const fn mode(&self) -> &'static str {
        match self {
            Self::Redis(_) => "redis",
            Self::Disabled(_) => "disabled",
        }
    }
}

async fn probe(url: &str) -> Result<RedisLockService, LockError> {
    let service = RedisLockService::new(url).await?;
    service.ping().await?;
    Ok(service)
}

impl LockService for LockBackend {
    async fn try_acquire(&self, key: &str, token: &str, lease: Duration) -> Result<bool, LockError> {
        match self {
            Self::Redis(locks) => locks.try_acquire(key, token, lease).await,
            Self::Disabled(locks) => locks.try_acquire(key, token, lease).await,
        }
    }

    async fn release(&self, key: &str, token: &str) {
        match self {
            Self::Redis(locks) => locks.release(key, token).await,
            Self::Disabled(locks) => locks.release(key, token).await,
        }
    }

    fn is_enabled(&self) -> bool {
        matches!(self, Self::Redis(_))
    }
}
