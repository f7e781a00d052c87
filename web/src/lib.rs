//! Axum HTTP surface for Nexus.
//!
//! # Routes
//!
//! | Method | Path          | Handler                                  |
//! |--------|---------------|------------------------------------------|
//! | POST   | `/api/redeem` | [`handlers::redeem`]                     |
//! | GET    | `/health`     | [`handlers::health_check`] (liveness)    |
//! | GET    | `/ready`      | [`handlers::readiness_check`] (readiness)|
//!
//! Prometheus metrics are served by [`metrics_router`] on a separate listener.
//!
//! # Example
//!
//! ```ignore
//! let engine = RedemptionEngine::new(store, locks, Arc::new(SystemClock), config.engine_config());
//! let app = build_router(AppState::new(engine));
//! axum::serve(listener, app).await?;
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod state;

use axum::{
    Router,
    http::StatusCode,
    routing::{get, post},
};
use nexus_core::lock::LockService;
use nexus_core::store::InventoryStore;
use nexus_runtime::metrics::MetricsServer;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use error::AppError;
pub use middleware::{REQUEST_ID_HEADER, RequestId, request_id_layer};
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;

/// Build the application router.
pub fn build_router<S, L>(state: AppState<S, L>) -> Router
where
    S: InventoryStore + 'static,
    L: LockService + 'static,
{
    let api_routes = Router::new().route("/redeem", post(handlers::redeem::<S, L>));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check::<S, L>))
        .nest("/api", api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(request_id_layer())
}

/// Router exposing `GET /metrics` in Prometheus text format.
pub fn metrics_router(metrics: Arc<MetricsServer>) -> Router {
    Router::new().route(
        "/metrics",
        get(move || {
            let metrics = Arc::clone(&metrics);
            async move {
                metrics
                    .render()
                    .map_or_else(|| (StatusCode::SERVICE_UNAVAILABLE, String::new()), |body| (StatusCode::OK, body))
            }
        }),
    )
}
