//! Fetch error types.

use thiserror::Error;

/// Errors that can occur while performing a request or decoding its body.
///
/// Cloneable so one failure can be handed to every consumer awaiting the
/// same in-flight request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Failed to send the request.
    #[error("Request failed: {0}")]
    Request(String),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// HTTP error response.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Failed to parse response body.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Request timeout.
    #[error("Request timed out")]
    Timeout,

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(String),
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::Json(e.to_string())
    }
}
