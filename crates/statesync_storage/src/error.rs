//! Error types for storage operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The storage document could not be parsed.
    #[error("storage document {path} is corrupted: {message}")]
    Corrupted {
        /// Path of the storage document.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// The storage document could not be encoded.
    #[error("failed to encode storage document: {0}")]
    Encode(#[from] serde_json::Error),
}
