//! Store adapter abstraction.
//!
//! A store is anything that can read a value for a key and write a value
//! for a key. Either operation may complete immediately (local storage) or
//! later (network), which [`Awaitable`] makes explicit.

use crate::error::SyncResult;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed store operation that completes later.
pub type StoreFuture<T> = Pin<Box<dyn Future<Output = SyncResult<T>> + Send + 'static>>;

/// Result of a store operation: available now, or pending.
pub enum Awaitable<T> {
    /// The operation already completed.
    Ready(SyncResult<T>),
    /// The operation completes when the future resolves.
    Pending(StoreFuture<T>),
}

impl<T> Awaitable<T> {
    /// A successful, already completed operation.
    pub fn ready(value: T) -> Self {
        Self::Ready(Ok(value))
    }

    /// Wraps a future.
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = SyncResult<T>> + Send + 'static,
    {
        Self::Pending(Box::pin(future))
    }

    /// Returns true if the result is available without awaiting.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Waits for the result.
    pub async fn resolve(self) -> SyncResult<T> {
        match self {
            Self::Ready(result) => result,
            Self::Pending(future) => future.await,
        }
    }
}

impl<T> From<SyncResult<T>> for Awaitable<T> {
    fn from(result: SyncResult<T>) -> Self {
        Self::Ready(result)
    }
}

/// A key/value store a cell synchronizes with.
///
/// `read` returning `Ok(None)` means "nothing stored yet"; the engine then
/// pushes the cell's initial value out with `write`. `write` returns the
/// value it stored so adapters can be chained.
pub trait StateStore<V>: Send + Sync + 'static {
    /// Reads the value stored under `key`.
    fn read(&self, key: &str) -> Awaitable<Option<V>>;

    /// Stores `value` under `key`.
    fn write(&self, key: &str, value: V) -> Awaitable<V>;

    /// Scope this store's keys are claimed in by a [`crate::LoadRegistry`].
    ///
    /// Stores of different kinds sharing a registry must use different
    /// scopes, or the first mount of a key would suppress the other's load.
    fn registry_scope(&self) -> &str {
        ""
    }
}

impl<V, S> StateStore<V> for Arc<S>
where
    S: StateStore<V> + ?Sized,
{
    fn read(&self, key: &str) -> Awaitable<Option<V>> {
        (**self).read(key)
    }

    fn write(&self, key: &str, value: V) -> Awaitable<V> {
        (**self).write(key, value)
    }

    fn registry_scope(&self) -> &str {
        (**self).registry_scope()
    }
}

/// A store assembled from a read function and a write function.
///
/// # Example
///
/// ```rust
/// use statesync_engine::{Awaitable, FnStore, StateStore};
///
/// let store = FnStore::new(
///     |_key: &str| Awaitable::<Option<u32>>::ready(None),
///     |_key: &str, value: u32| Awaitable::ready(value),
/// );
/// assert!(StateStore::<u32>::read(&store, "/count").is_ready());
/// ```
pub struct FnStore<R, W> {
    read: R,
    write: W,
}

impl<R, W> FnStore<R, W> {
    /// Pairs the two functions.
    pub fn new(read: R, write: W) -> Self {
        Self { read, write }
    }
}

impl<V, R, W> StateStore<V> for FnStore<R, W>
where
    R: Fn(&str) -> Awaitable<Option<V>> + Send + Sync + 'static,
    W: Fn(&str, V) -> Awaitable<V> + Send + Sync + 'static,
{
    fn read(&self, key: &str) -> Awaitable<Option<V>> {
        (self.read)(key)
    }

    fn write(&self, key: &str, value: V) -> Awaitable<V> {
        (self.write)(key, value)
    }
}

/// A process-local store.
///
/// Backs plain in-memory state: a cell over a fresh `MemoryStore` behaves
/// like an ordinary value with a setter, and several cells can share one.
pub struct MemoryStore<V> {
    items: RwLock<HashMap<String, V>>,
}

impl<V> MemoryStore<V> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the number of stored keys.
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

impl<V: Clone> MemoryStore<V> {
    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<V> {
        self.items.read().get(key).cloned()
    }

    /// Stores a value directly, bypassing any cell.
    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.items.write().insert(key.into(), value);
    }
}

impl<V> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> StateStore<V> for MemoryStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn read(&self, key: &str) -> Awaitable<Option<V>> {
        Awaitable::ready(self.get(key))
    }

    fn write(&self, key: &str, value: V) -> Awaitable<V> {
        self.insert(key, value.clone());
        Awaitable::ready(value)
    }
}
