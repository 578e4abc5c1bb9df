//! Error type shared by the WasteWatch crates

use thiserror::Error;

/// Result alias used throughout the shared library and the storage layer
pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by storage, configuration and shared helpers
#[derive(Error, Debug)]
pub enum Error {
    /// SQLite query or connection failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Filesystem failure (config file, database directory)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON column could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Missing or malformed configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Report, hotspot or other entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller supplied an out-of-range or malformed value
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Stored data violates an expected invariant
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for errors that mean "the entity is not there", which callers
    /// report immediately instead of retrying.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::Database(sqlx::Error::RowNotFound))
    }
}
