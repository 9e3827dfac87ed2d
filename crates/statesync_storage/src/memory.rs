//! In-memory storage backend for testing.

use crate::backend::KeyValueStorage;
use crate::error::StorageResult;
use parking_lot::RwLock;
use std::collections::HashMap;

/// An in-memory key/value backend.
///
/// This backend keeps everything in a map and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Caches that don't need to survive the process
///
/// # Example
///
/// ```rust
/// use statesync_storage::{InMemoryStorage, KeyValueStorage};
///
/// let storage = InMemoryStorage::new();
/// storage.set_item("greeting", "hello").unwrap();
/// assert_eq!(storage.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    items: RwLock<HashMap<String, String>>,
}

impl InMemoryStorage {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend with pre-existing entries.
    ///
    /// Useful for testing the "value already stored" path.
    #[must_use]
    pub fn with_items<K, V>(items: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            items: RwLock::new(
                items
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// Returns the number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.items.write().clear();
    }
}

impl KeyValueStorage for InMemoryStorage {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.items.read().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        self.items.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> StorageResult<()> {
        self.items.write().remove(key);
        Ok(())
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        Ok(self.items.read().keys().cloned().collect())
    }
}
