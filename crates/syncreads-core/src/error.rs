//! Error types for syncreads-core

use thiserror::Error;

/// Result type alias using syncreads-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in syncreads-core storage and orchestration
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// User, device or sync job not found
    #[error("{0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Device cloud error outside of a sync job (e.g. device registration)
    #[error(transparent)]
    Remote(#[from] crate::remote::RemoteError),
}
