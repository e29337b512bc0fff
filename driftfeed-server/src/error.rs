//! Error types for driftfeed-server
//!
//! The feed path degrades rather than fails: transient storage errors on
//! record paths are logged and swallowed, invalid cursors restart
//! pagination, and an unavailable profile falls back to neutral scoring.
//! Only the variants below that map to 4xx/5xx ever reach a client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Main error type for driftfeed-server
#[derive(Error, Debug)]
pub enum Error {
    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Retry-safe storage failure (e.g. recording a view).
    /// Recovered locally; never surfaced to the visitor.
    #[error("Transient storage error: {0}")]
    TransientStorage(String),

    /// Malformed or stale pagination cursor.
    /// Recovered by restarting pagination from page 1.
    #[error("Invalid cursor")]
    InvalidCursor,

    /// Visitor profile could not be built.
    /// Recovered by scoring against the neutral profile.
    #[error("Profile unavailable: {0}")]
    ProfileUnavailable(String),

    /// Identity migration failed; the whole transaction must be retried.
    #[error("Migration conflict: {0}")]
    MigrationConflict(String),

    /// Feed assembly exceeded its time bound (retryable)
    #[error("Request timed out")]
    Timeout,

    /// Invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using driftfeed-server Error
pub type Result<T> = std::result::Result<T, Error>;

impl From<driftfeed_common::Error> for Error {
    fn from(err: driftfeed_common::Error) -> Self {
        match err {
            driftfeed_common::Error::Database(e) => Error::Database(e),
            driftfeed_common::Error::Io(e) => Error::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, retryable) = match &self {
            Error::BadRequest(_) => (StatusCode::BAD_REQUEST, false),
            Error::InvalidCursor => (StatusCode::BAD_REQUEST, false),
            Error::Timeout => (StatusCode::SERVICE_UNAVAILABLE, true),
            Error::MigrationConflict(_) => (StatusCode::CONFLICT, true),
            Error::Database(_) | Error::TransientStorage(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, true)
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, false),
        };

        let body = Json(json!({
            "error": self.to_string(),
            "retryable": retryable,
        }));

        (status, body).into_response()
    }
}
