//! First-load deduplication.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

/// Set of keys that have already triggered a first load.
///
/// Clones share the same set. Entries are only ever added: once a key has
/// been claimed, no cell sharing this registry will read it again for the
/// lifetime of the registry.
///
/// Claims are scoped. Each store names its scope (see
/// [`crate::StateStore::registry_scope`]), so a local cache and a server
/// sharing one registry and one key still load independently.
#[derive(Debug, Clone, Default)]
pub struct LoadRegistry {
    keys: Arc<Mutex<HashSet<(String, String)>>>,
}

impl LoadRegistry {
    /// Creates an empty, isolated registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide registry.
    ///
    /// Only [`crate::SyncConfig::default`] reaches for this. Libraries and
    /// tests should pass their own registry.
    pub fn global() -> Self {
        static GLOBAL: OnceLock<LoadRegistry> = OnceLock::new();
        GLOBAL.get_or_init(LoadRegistry::new).clone()
    }

    /// Claims `key` in the default scope.
    pub fn claim(&self, key: &str) -> bool {
        self.claim_in("", key)
    }

    /// Claims `key` for loading within `scope`.
    ///
    /// Returns `true` exactly once per scope and key: the caller that gets
    /// `true` is the one that must issue the load.
    pub fn claim_in(&self, scope: &str, key: &str) -> bool {
        self.keys.lock().insert((scope.to_string(), key.to_string()))
    }

    /// Returns true if `key` has been claimed in the default scope.
    pub fn contains(&self, key: &str) -> bool {
        self.contains_in("", key)
    }

    /// Returns true if `key` has been claimed within `scope`.
    pub fn contains_in(&self, scope: &str, key: &str) -> bool {
        self.keys
            .lock()
            .contains(&(scope.to_string(), key.to_string()))
    }

    /// Number of claims across all scopes.
    pub fn len(&self) -> usize {
        self.keys.lock().len()
    }

    /// Returns true if nothing has been claimed.
    pub fn is_empty(&self) -> bool {
        self.keys.lock().is_empty()
    }
}
