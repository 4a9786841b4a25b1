//! Validation error type shared by all bundle contracts.

use thiserror::Error;

/// A contract validation failure: malformed identifiers, out-of-range
/// sizes, reserved keys, duplicate entries, and similar request-shape
/// problems. Maps to HTTP 400 at the transport boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    /// Human-readable description of the rejected input.
    pub message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        ValidationError {
            message: message.into(),
        }
    }
}
