//! Error types for the sync engine.

use statesync_storage::StorageError;
use std::sync::Arc;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while synchronizing a cell with its store.
///
/// None of these ever escape through a handle's value or setter. They are
/// delivered to the cell's [`ErrorHook`].
#[derive(Error, Debug)]
pub enum SyncError {
    /// The store failed to read a key.
    #[error("failed to load '{key}': {source}")]
    Load {
        /// Key being loaded.
        key: String,
        /// Adapter failure.
        #[source]
        source: Box<SyncError>,
    },

    /// The store failed to write a key.
    #[error("failed to write '{key}': {source}")]
    Write {
        /// Key being written.
        key: String,
        /// Adapter failure.
        #[source]
        source: Box<SyncError>,
    },

    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A value could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The server answered outside the accepted status range.
    #[error("{method} for '{url}' returned a {status} response")]
    HttpStatus {
        /// Request method.
        method: &'static str,
        /// Request URL.
        url: String,
        /// Response status.
        status: u16,
    },

    /// The HTTP client could not complete the request.
    #[error("transport error: {0}")]
    Transport(String),

    /// A cursor could not project or patch its parent.
    #[error("cannot project '{key}': {message}")]
    Projection {
        /// Cursor key.
        key: String,
        /// Why the projection failed.
        message: String,
    },

    /// An asynchronous store was used outside a tokio runtime.
    #[error("no async runtime available to drive '{0}'")]
    NoRuntime(String),
}

impl SyncError {
    /// Wraps an adapter failure while reading `key`.
    pub fn load(key: impl Into<String>, source: SyncError) -> Self {
        Self::Load {
            key: key.into(),
            source: Box::new(source),
        }
    }

    /// Wraps an adapter failure while writing `key`.
    pub fn write(key: impl Into<String>, source: SyncError) -> Self {
        Self::Write {
            key: key.into(),
            source: Box::new(source),
        }
    }

    /// Returns the adapter failure underneath a load or write error.
    pub fn root(&self) -> &SyncError {
        match self {
            Self::Load { source, .. } | Self::Write { source, .. } => source.root(),
            other => other,
        }
    }

    /// Creates a projection error for a cursor key.
    pub fn projection(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Projection {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Callback receiving every failure a cell or composer runs into.
pub type ErrorHook = Arc<dyn Fn(&SyncError) + Send + Sync>;

/// The default error hook: logs the error and moves on.
pub fn log_error() -> ErrorHook {
    Arc::new(|err: &SyncError| {
        tracing::error!(error = %err, "state sync failed");
    })
}
