//! API error mapping.
//!
//! [`ApiError`] wraps a [`StoreError`] and maps it 1:1 onto an HTTP
//! response: the store's status code becomes the HTTP status, and the
//! body is `{"error": {"code", "message", "details"}}` with `details`
//! omitted when absent.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use graphapi_store::StoreError;

/// Structured error detail in API responses.
#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Transport wrapper around a store error.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ApiError(pub StoreError);

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(code = %self.0.code, "request failed: {}", self.0.message);
        }
        let body = serde_json::json!({
            "error": ApiErrorDetail {
                code: self.0.code,
                message: self.0.message,
                details: self.0.details,
            },
        });
        (status, axum::Json(body)).into_response()
    }
}
