//! Prometheus metrics for redemptions and the lock adapter.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `nexus_redemptions_total{outcome}` - Redemptions by outcome (`assigned`, `replayed` or an error kind)
//! - `nexus_lock_busy_total` - Acquisitions that gave up on a contended lock
//! - `nexus_lock_degraded_total` - Acquisitions that proceeded without exclusion
//! - `nexus_reservation_conflicts_total{kind}` - Reservations that lost a race
//!
//! ## Histograms
//! - `nexus_redeem_duration_seconds` - End-to-end redemption latency
//!
//! # Example
//!
//! ```rust,no_run
//! use nexus_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! let body = server.render();
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub use metrics::{counter, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder plus the address its scrape endpoint is served on.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server description.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Address the scrape endpoint should be bound to.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Register metric descriptions and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed. A recorder
    /// that is already installed is tolerated with a warning.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if the recorder hasn't been installed by this server.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(
        "nexus_redemptions_total",
        "Total redemption attempts by outcome (assigned, replayed, or error kind)"
    );
    describe_histogram!(
        "nexus_redeem_duration_seconds",
        "End-to-end redemption latency, lock wait included"
    );
    describe_counter!(
        "nexus_lock_busy_total",
        "Lock acquisitions that gave up because the key stayed held"
    );
    describe_counter!(
        "nexus_lock_degraded_total",
        "Lock acquisitions that proceeded without mutual exclusion because the lock service was unreachable"
    );
    describe_counter!(
        "nexus_reservation_conflicts_total",
        "Reservations rejected by the store because the item or code changed concurrently"
    );
}

/// Redemption metrics recorder.
pub struct RedemptionMetrics;

impl RedemptionMetrics {
    /// Record a finished redemption.
    pub fn record(outcome: &'static str, duration: Duration) {
        counter!("nexus_redemptions_total", "outcome" => outcome).increment(1);
        histogram!("nexus_redeem_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a reservation that lost a race.
    pub fn record_conflict(kind: &'static str) {
        counter!("nexus_reservation_conflicts_total", "kind" => kind).increment(1);
    }
}

/// Lock adapter metrics recorder.
pub struct LockMetrics;

impl LockMetrics {
    /// Record an acquisition that gave up.
    pub fn record_busy() {
        counter!("nexus_lock_busy_total").increment(1);
    }

    /// Record an acquisition that proceeded without exclusion.
    pub fn record_degraded() {
        counter!("nexus_lock_degraded_total").increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_server_creation() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 0)));
        let server = MetricsServer::new(addr);
        assert!(server.handle().is_none());
        assert!(server.render().is_none());
        assert_eq!(server.addr(), addr);
    }

    #[test]
    fn test_recorders_without_installed_recorder_are_noops() {
        RedemptionMetrics::record("assigned", Duration::from_millis(3));
        RedemptionMetrics::record_conflict("item_taken");
        LockMetrics::record_busy();
        LockMetrics::record_degraded();
    }
}
