//! Error types for web handlers.
//!
//! [`AppError`] bridges [`RedeemError`] and HTTP responses. Every error body
//! has the same shape:
//!
//! ```json
//! { "code": "OUT_OF_STOCK", "message": "Out of stock, please contact support" }
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use nexus_core::{RedeemError, StoreError};
use serde::Serialize;
use std::fmt;

/// Application error type for web handlers.
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: &'static str,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code,
            source: None,
        }
    }

    /// Attach an internal error for logging.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "INVALID_INPUT", message)
    }

    /// HTTP status of the response.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }

    /// User-facing message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    /// Error code (for client error handling).
    code: &'static str,
    /// Human-readable error message.
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            if let Some(source) = &self.source {
                tracing::error!(
                    status = %self.status,
                    code = self.code,
                    message = %self.message,
                    error = %source,
                    "Server error"
                );
            } else {
                tracing::warn!(status = %self.status, code = self.code, message = %self.message, "Server error");
            }
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<RedeemError> for AppError {
    fn from(err: RedeemError) -> Self {
        let message = err.to_string();
        match err {
            RedeemError::InvalidInput { .. } => Self::bad_request(message),
            RedeemError::NotFound => Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message),
            RedeemError::Expired => Self::new(StatusCode::GONE, "EXPIRED", message),
            RedeemError::OutOfStock => Self::new(StatusCode::CONFLICT, "OUT_OF_STOCK", message),
            RedeemError::Busy => Self::new(StatusCode::SERVICE_UNAVAILABLE, "BUSY", message),
            RedeemError::Store(StoreError::Timeout) => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "STORE_UNAVAILABLE",
                "Service temporarily unavailable, please retry later",
            )
            .with_source(StoreError::Timeout),
            RedeemError::Store(store) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR", "Internal error, please retry later")
                    .with_source(store)
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code can use unwrap
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AppError::bad_request("Invalid input");
        assert_eq!(err.to_string(), "[INVALID_INPUT] Invalid input");
    }

    #[test]
    fn test_redeem_error_mapping() {
        let cases = [
            (RedeemError::invalid_input("empty"), StatusCode::BAD_REQUEST, "INVALID_INPUT"),
            (RedeemError::NotFound, StatusCode::NOT_FOUND, "NOT_FOUND"),
            (RedeemError::Expired, StatusCode::GONE, "EXPIRED"),
            (RedeemError::OutOfStock, StatusCode::CONFLICT, "OUT_OF_STOCK"),
            (RedeemError::Busy, StatusCode::SERVICE_UNAVAILABLE, "BUSY"),
            (
                RedeemError::Store(StoreError::Timeout),
                StatusCode::SERVICE_UNAVAILABLE,
                "STORE_UNAVAILABLE",
            ),
            (
                RedeemError::Store(StoreError::Database("connection reset".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORE_ERROR",
            ),
        ];

        for (err, status, code) in cases {
            let app = AppError::from(err);
            assert_eq!(app.status(), status);
            assert_eq!(app.code(), code);
        }
    }

    #[test]
    fn test_store_details_are_not_exposed() {
        let app = AppError::from(RedeemError::Store(StoreError::Database("password=hunter2".into())));
        assert!(!app.message().contains("hunter2"));
        assert!(std::error::Error::source(&app).is_some());
    }

    #[tokio::test]
    async fn test_store_error_response_body() {
        let err = RedeemError::Store(StoreError::Database("relation missing".into()));
        let response = AppError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "STORE_ERROR");
        assert_eq!(body["message"], "Internal error, please retry later");
    }
}
