//! Error types for jsonstore core.
//!
//! Business-rule violations (no document matched, key already present) are
//! not errors: mutations report them as `Ok(false)`. The variants here cover
//! everything else.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in jsonstore core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] jsonstore_storage::StorageError),

    /// JSON (de)serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A non-nullable item was read for a key that is not stored.
    #[error("key not found: {key}")]
    KeyNotFound {
        /// The requested key.
        key: String,
    },

    /// The stored text is not a JSON object.
    #[error("invalid store format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// Writing the batch this mutation belonged to failed.
    ///
    /// Every request of the batch receives this error, including the ones
    /// whose own change applied cleanly.
    #[error("persist failed: {message}")]
    Persist {
        /// Rendering of the underlying error.
        message: String,
    },

    /// The store handle was closed before the mutation could run.
    #[error("store is closed")]
    StoreClosed,

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates a key not found error.
    pub fn key_not_found(key: impl Into<String>) -> Self {
        Self::KeyNotFound { key: key.into() }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates a persist error.
    pub fn persist(message: impl Into<String>) -> Self {
        Self::Persist {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }
}
