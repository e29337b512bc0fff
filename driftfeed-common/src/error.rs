//! Common error types for driftfeed

use thiserror::Error;

/// Common result type for driftfeed operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared across driftfeed crates.
///
/// The shared layer only fails on storage and filesystem access; richer
/// taxonomies (cursor, profile, migration failures) live in the crates
/// that produce them.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
