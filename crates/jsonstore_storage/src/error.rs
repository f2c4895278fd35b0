//! Error types for storage operations.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file stayed locked by someone else for the whole retry budget.
    #[error("file {path} still in use after {waited:?}")]
    Contended {
        /// The file that could not be accessed.
        path: String,
        /// How long access was retried.
        waited: Duration,
    },

    /// Encryption failed, or an envelope did not decrypt.
    #[error("encryption error: {0}")]
    Encryption(String),
}
