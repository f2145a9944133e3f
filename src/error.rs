//! Error types for the live-stream core
//!
//! The registry never fails: a missing stream is `None`, not an error. Errors
//! only arise at the edges, where stream keys are validated, chunks are
//! persisted and HTTP requests are decoded.

use std::io;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::registry::KeyError;

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Stream key failed the format contract
    #[error("invalid stream key: {0}")]
    Validation(#[from] KeyError),

    /// Upload could not be read from the client (malformed body, aborted request)
    #[error("transport error: {0}")]
    Transport(String),

    /// Chunk could not be written to storage
    #[error("storage error: {0}")]
    Storage(#[source] io::Error),

    /// Generic I/O failure (socket bind, listener)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid configuration value
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the uploader should fix its request rather than retry it
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Validation(_) | Error::Transport(_))
    }

    /// HTTP status used when this error reaches an API caller
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) | Error::Transport(_) => StatusCode::BAD_REQUEST,
            Error::Storage(_) | Error::Io(_) | Error::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
