//! Storage error type for graphapi-store.
//!
//! [`StoreError`] carries the `{statusCode, code, message, details}`
//! triple the transport layer maps 1:1 onto an HTTP response. Codes are
//! resource-prefixed (`ICON_SET_NOT_FOUND`, `LAYOUT_SET_ENTRIES_EMPTY`,
//! ...) so a client sees one coherent vocabulary regardless of which
//! store raised the error.

use serde_json::Value;
use thiserror::Error;

use graphapi_core::ValidationError;

/// An error raised by a store operation.
#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct StoreError {
    /// HTTP status the transport should respond with.
    pub status_code: u16,
    /// Stable machine-readable error code.
    pub code: String,
    /// Human-readable description.
    pub message: String,
    /// Optional structured context (offending ids, checksums, causes).
    pub details: Option<Value>,
}

impl StoreError {
    pub fn new(status_code: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError {
            status_code,
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// 404 with a resource-prefixed code.
    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::new(404, code, message)
    }

    /// 409 with a resource-prefixed code.
    pub fn conflict(code: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::new(409, code, message)
    }

    /// 400 with a resource-prefixed code.
    pub fn validation(code: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::new(400, code, message)
    }

    /// 500 with a resource-prefixed code. Terminal by design: integrity
    /// failures are surfaced, never retried or silently repaired.
    pub fn fatal(code: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::new(500, code, message)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::fatal("STORAGE_ERROR", format!("database error: {err}"))
    }
}

impl From<ValidationError> for StoreError {
    fn from(err: ValidationError) -> Self {
        StoreError::validation("VALIDATION_ERROR", err.message)
    }
}
