//! Storage backend trait definition.

use crate::error::StorageResult;

/// A string key/value store, the shape of browser-style local storage.
///
/// # Invariants
///
/// - `get_item` returns exactly the string last passed to `set_item`
/// - `get_item` returns `None` for keys never set or removed since
/// - Backends must be `Send + Sync`; the engine shares them across cells
///
/// # Implementors
///
/// - [`super::InMemoryStorage`] - For testing
/// - [`super::FileStorage`] - For persistent storage
pub trait KeyValueStorage: Send + Sync {
    /// Returns the string stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing medium cannot be read.
    fn get_item(&self, key: &str) -> StorageResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be persisted.
    fn set_item(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Removes `key`. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the removal cannot be persisted.
    fn remove_item(&self, key: &str) -> StorageResult<()>;

    /// Returns all stored keys in unspecified order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing medium cannot be read.
    fn keys(&self) -> StorageResult<Vec<String>>;
}
