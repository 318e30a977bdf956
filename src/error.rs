//! ==============================================================================
//! error.rs - error types and their http rendering
//! ==============================================================================
//!
//! purpose:
//!     DashboardError covers everything the aggregator and its collaborators
//!     can fail with. ApiError turns it into the `{success: false, error}`
//!     body the dashboard expects.
//!
//! relationships:
//!     - raised by: domain.rs (validation), feed.rs (network), config.rs
//!     - rendered by: api.rs (handler return type)
//!     - never surfaced: Network errors stop at store.rs (fallback path)
//!
//! ==============================================================================

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Errors raised by the aggregator and its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    /// Malformed or non-numeric input from a device or the dashboard form.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The external reading feed could not be fetched or decoded.
    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for DashboardError {
    fn from(err: reqwest::Error) -> Self {
        DashboardError::Network(err.to_string())
    }
}

/// HTTP-facing error; renders `{success: false, error}`.
#[derive(Debug)]
pub struct ApiError(pub DashboardError);

impl From<DashboardError> for ApiError {
    fn from(err: DashboardError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            DashboardError::Validation(msg) => {
                tracing::warn!(error = %msg, "Rejected request");
                (StatusCode::BAD_REQUEST, msg.clone())
            }
            other => {
                tracing::error!(error = %other, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        };

        let body = json!({
            "success": false,
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
