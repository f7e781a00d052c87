//! Health check endpoints.
//!
//! These endpoints are used by load balancers and monitoring systems
//! to verify service health.

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use nexus_core::lock::LockService;
use nexus_core::store::InventoryStore;
use serde::Serialize;

/// Liveness response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"`
    pub status: &'static str,
    /// Service version
    pub version: &'static str,
}

/// Simple health check endpoint (for basic liveness).
///
/// Does NOT check dependencies.
///
/// ```text
/// GET /health
/// {"status":"ok","version":"0.1.0"}
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

/// Readiness response.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    /// Overall readiness
    pub ready: bool,
    /// Store answered a ping in time
    pub database: bool,
    /// Lock backend in use; a disabled lock does not affect readiness
    pub lock: &'static str,
}

/// Readiness check endpoint.
///
/// # Status Codes
///
/// - 200 OK: the store answered
/// - 503 Service Unavailable: the store failed or timed out
///
/// ```text
/// GET /ready
/// {"ready":true,"database":true,"lock":"redis"}
/// ```
pub async fn readiness_check<S, L>(State(state): State<AppState<S, L>>) -> (StatusCode, Json<ReadinessResponse>)
where
    S: InventoryStore + 'static,
    L: LockService + 'static,
{
    let database = match tokio::time::timeout(state.readiness_timeout(), state.engine().store().ping()).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Readiness: store ping failed");
            false
        },
        Err(_) => {
            tracing::warn!("Readiness: store ping timed out");
            false
        },
    };

    let status = if database { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (
        status,
        Json(ReadinessResponse {
            ready: database,
            database,
            lock: state.lock_mode(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simple_health_check() {
        let (status, Json(body)) = health_check().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "ok");
    }
}
