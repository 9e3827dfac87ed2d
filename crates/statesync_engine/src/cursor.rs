//! Cursors over nested state.
//!
//! A [`CursorFactory`] wraps a parent `(value, setter)` pair and hands out
//! one [`Cursor`] per key. Each cursor is an ordinary [`SyncedState`] whose
//! store is the parent itself: reading projects `parent[key]`, writing
//! patches a copy of the parent and sends the copy to the parent setter.
//! The parent value is never mutated in place.
//!
//! ```rust
//! use serde_json::json;
//! use statesync_engine::{sync, CursorFactory, MemoryStore, StateHandle, SyncConfig};
//!
//! let doc = sync("/doc", json!({"hi": 5}), MemoryStore::new(), SyncConfig::isolated());
//! let cursors = CursorFactory::from_handle(&doc);
//!
//! let hi = cursors.cursor::<u32>("hi").unwrap();
//! assert_eq!(hi.value(), 5);
//!
//! hi.set(4);
//! assert_eq!(doc.value(), json!({"hi": 4}));
//! ```

use crate::config::SyncConfig;
use crate::error::{log_error, ErrorHook, SyncError, SyncResult};
use crate::registry::LoadRegistry;
use crate::state::{SyncEngine, SyncedState};
use crate::store::{Awaitable, StateStore};
use crate::value::{Setter, StateHandle, StateUpdate, StateValue};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Where a cursor points inside its parent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CursorKey {
    /// A field of a record.
    Field(String),
    /// An element of a collection.
    Index(usize),
}

impl fmt::Display for CursorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CursorKey::Field(name) => f.write_str(name),
            CursorKey::Index(index) => write!(f, "{index}"),
        }
    }
}

impl From<&str> for CursorKey {
    fn from(name: &str) -> Self {
        CursorKey::Field(name.to_string())
    }
}

impl From<String> for CursorKey {
    fn from(name: String) -> Self {
        CursorKey::Field(name)
    }
}

impl From<usize> for CursorKey {
    fn from(index: usize) -> Self {
        CursorKey::Index(index)
    }
}

fn project<P, C>(parent: &P, key: &CursorKey) -> SyncResult<C>
where
    P: Serialize,
    C: DeserializeOwned,
{
    let doc = serde_json::to_value(parent)?;
    let slot = match (doc, key) {
        // An absent field reads as null so optional children still project.
        (Value::Object(mut map), CursorKey::Field(name)) => map.remove(name).unwrap_or(Value::Null),
        (Value::Array(mut items), CursorKey::Index(index)) if *index < items.len() => {
            items.swap_remove(*index)
        }
        (Value::Array(items), CursorKey::Index(index)) => {
            return Err(SyncError::projection(
                key.to_string(),
                format!("index {index} out of bounds for {} elements", items.len()),
            ))
        }
        (other, _) => {
            return Err(SyncError::projection(
                key.to_string(),
                format!("parent is not addressable by this key: {other}"),
            ))
        }
    };

    serde_json::from_value(slot).map_err(|err| SyncError::projection(key.to_string(), err.to_string()))
}

fn patch<P, C>(parent: &P, key: &CursorKey, value: &C) -> SyncResult<P>
where
    P: StateValue,
    C: Serialize,
{
    let mut doc = serde_json::to_value(parent.clone())?;
    let value = serde_json::to_value(value)?;

    match (&mut doc, key) {
        (Value::Object(map), CursorKey::Field(name)) => {
            map.insert(name.clone(), value);
        }
        (Value::Array(items), CursorKey::Index(index)) => match items.get_mut(*index) {
            Some(slot) => *slot = value,
            None => {
                return Err(SyncError::projection(
                    key.to_string(),
                    format!("index {index} out of bounds"),
                ))
            }
        },
        _ => {
            return Err(SyncError::projection(
                key.to_string(),
                "parent is no longer addressable by this key",
            ))
        }
    }

    serde_json::from_value(doc).map_err(|err| SyncError::projection(key.to_string(), err.to_string()))
}

/// The latest parent value as seen by one factory.
type ParentSnapshot<P> = Arc<Mutex<P>>;

/// Store backing a cursor's cell: the parent, addressed by one key.
struct PatchStore<P, C> {
    parent: ParentSnapshot<P>,
    setter: Setter<P>,
    key: CursorKey,
    _child: PhantomData<fn() -> C>,
}

impl<P, C> StateStore<C> for PatchStore<P, C>
where
    P: StateValue,
    C: StateValue,
{
    fn read(&self, _key: &str) -> Awaitable<Option<C>> {
        let parent = self.parent.lock();
        Awaitable::Ready(project(&*parent, &self.key).map(Some))
    }

    fn write(&self, _key: &str, value: C) -> Awaitable<C> {
        let next = {
            let mut parent = self.parent.lock();
            match patch(&*parent, &self.key, &value) {
                Ok(next) => {
                    *parent = next.clone();
                    next
                }
                Err(err) => return Awaitable::Ready(Err(err)),
            }
        };

        tracing::trace!(key = %self.key, "patching parent");
        self.setter.set(next);
        Awaitable::ready(value)
    }
}

/// Hands out cursors over the keys of one parent value.
pub struct CursorFactory<P> {
    parent: ParentSnapshot<P>,
    setter: Setter<P>,
    registry: LoadRegistry,
    on_error: ErrorHook,
}

impl<P: StateValue> CursorFactory<P> {
    /// Creates a factory over a parent value and its setter.
    pub fn new(parent_value: P, parent_setter: Setter<P>) -> Self {
        Self {
            parent: Arc::new(Mutex::new(parent_value)),
            setter: parent_setter,
            registry: LoadRegistry::new(),
            on_error: log_error(),
        }
    }

    /// Creates a factory over any handle's `(value, setter)` pair.
    pub fn from_handle<H>(handle: &H) -> Self
    where
        H: StateHandle<P> + Clone + 'static,
    {
        let (value, setter) = handle.state();
        Self::new(value, setter)
    }

    /// Sets the hook receiving patch failures.
    pub fn with_error_hook(mut self, hook: ErrorHook) -> Self {
        self.on_error = hook;
        self
    }

    /// Returns the parent value as last seen or patched by this factory.
    pub fn parent(&self) -> P {
        self.parent.lock().clone()
    }

    /// Replaces the parent snapshot after the parent changed elsewhere.
    ///
    /// Existing cursors keep their values; their next write patches the
    /// new snapshot.
    pub fn rebase(&self, parent_value: P) {
        *self.parent.lock() = parent_value;
    }

    /// Creates a cursor over `key`.
    ///
    /// Fails with [`SyncError::Projection`] if the parent cannot be
    /// addressed by `key` or the slot does not decode as `C`.
    pub fn cursor<C: StateValue>(&self, key: impl Into<CursorKey>) -> SyncResult<Cursor<P, C>> {
        let key = key.into();
        let initial: C = {
            let parent = self.parent.lock();
            project(&*parent, &key)?
        };

        let store = PatchStore {
            parent: Arc::clone(&self.parent),
            setter: self.setter.clone(),
            key: key.clone(),
            _child: PhantomData,
        };
        let config = SyncConfig {
            registry: self.registry.clone(),
            on_error: Arc::clone(&self.on_error),
        };

        tracing::debug!(key = %key, "opening cursor");
        let state = SyncEngine::new(store, config).sync(key.to_string(), initial);

        Ok(Cursor {
            key,
            state,
            _parent: PhantomData,
        })
    }
}

impl<P> fmt::Debug for CursorFactory<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CursorFactory").finish_non_exhaustive()
    }
}

/// A writable view over one key of a parent value.
pub struct Cursor<P, C> {
    key: CursorKey,
    state: SyncedState<C>,
    _parent: PhantomData<fn() -> P>,
}

impl<P, C: StateValue> Cursor<P, C> {
    /// Returns the key this cursor points at.
    pub fn key(&self) -> &CursorKey {
        &self.key
    }

    /// Returns the cell backing this cursor.
    pub fn cell(&self) -> &SyncedState<C> {
        &self.state
    }
}

impl<P, C> StateHandle<C> for Cursor<P, C>
where
    P: StateValue,
    C: StateValue,
{
    fn value(&self) -> C {
        self.state.value()
    }

    fn set_state(&self, update: StateUpdate<C>) {
        self.state.set_state(update);
    }
}

impl<P, C> Clone for Cursor<P, C> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            state: self.state.clone(),
            _parent: PhantomData,
        }
    }
}

impl<P, C> fmt::Debug for Cursor<P, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor").field("key", &self.key).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::sync;
    use crate::store::MemoryStore;
    use serde::Deserialize;
    use serde_json::json;

    fn doc(value: Value) -> SyncedState<Value> {
        sync("/doc", value, MemoryStore::new(), SyncConfig::isolated())
    }

    #[test]
    fn set_reaches_the_parent() {
        let parent = doc(json!({"hi": 5}));
        let factory = CursorFactory::from_handle(&parent);
        let hi = factory.cursor::<i64>("hi").unwrap();

        assert_eq!(hi.value(), 5);
        hi.set(4);

        assert_eq!(hi.value(), 4);
        assert_eq!(parent.value(), json!({"hi": 4}));
        assert_eq!(factory.parent(), json!({"hi": 4}));
    }

    #[test]
    fn opening_a_cursor_does_not_write() {
        let parent = doc(json!({"hi": 5}));
        let writes_before = parent.stats().writes_issued;
        let factory = CursorFactory::from_handle(&parent);

        let hi = factory.cursor::<i64>("hi").unwrap();
        assert_eq!(hi.cell().stats().writes_issued, 0);
        assert_eq!(parent.stats().writes_issued, writes_before);
    }

    #[test]
    fn sibling_cursors_patch_the_same_snapshot() {
        let parent = doc(json!({"a": 1, "b": 2}));
        let factory = CursorFactory::from_handle(&parent);
        let a = factory.cursor::<i64>("a").unwrap();
        let b = factory.cursor::<i64>("b").unwrap();

        a.set(10);
        b.update(|prev| prev * 10);

        assert_eq!(parent.value(), json!({"a": 10, "b": 20}));
    }

    #[test]
    fn parent_is_not_mutated_in_place() {
        let original = json!({"list": [1, 2]});
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let factory = CursorFactory::new(original.clone(), Setter::new(move |update: StateUpdate<Value>| {
            sink.lock().push(update.apply(&Value::Null));
        }));

        let list = factory.cursor::<Vec<i64>>("list").unwrap();
        list.update(|prev| {
            let mut next = prev.clone();
            next.push(3);
            next
        });

        assert_eq!(original, json!({"list": [1, 2]}));
        assert_eq!(*seen.lock(), vec![json!({"list": [1, 2, 3]})]);
    }

    #[test]
    fn collection_index() {
        let parent = doc(json!(["a", "b", "c"]));
        let factory = CursorFactory::from_handle(&parent);
        let second = factory.cursor::<String>(1).unwrap();

        assert_eq!(second.value(), "b");
        second.set("B".to_string());
        assert_eq!(parent.value(), json!(["a", "B", "c"]));

        assert!(matches!(
            factory.cursor::<String>(3),
            Err(SyncError::Projection { .. })
        ));
    }

    #[test]
    fn absent_field_projects_as_null() {
        let parent = doc(json!({}));
        let factory = CursorFactory::from_handle(&parent);

        let font = factory.cursor::<Option<String>>("font").unwrap();
        assert_eq!(font.value(), None);
        font.set(Some("mono".into()));
        assert_eq!(parent.value(), json!({"font": "mono"}));

        assert!(factory.cursor::<i64>("size").is_err());
    }

    #[test]
    fn scalar_parent_cannot_be_projected() {
        let parent = doc(json!(5));
        let factory = CursorFactory::from_handle(&parent);

        let err = factory.cursor::<i64>("hi").unwrap_err();
        assert!(err.to_string().starts_with("cannot project 'hi'"));
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Point {
        x: i64,
        y: i64,
    }

    #[test]
    fn typed_parent_and_failed_patch() {
        let parent = sync("/point", Point { x: 1, y: 2 }, MemoryStore::new(), SyncConfig::isolated());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let hook: ErrorHook = Arc::new(move |err: &SyncError| {
            sink.lock().push(matches!(err.root(), SyncError::Projection { .. }));
        });
        let factory = CursorFactory::from_handle(&parent).with_error_hook(hook);

        let x = factory.cursor::<i64>("x").unwrap();
        x.set(7);
        assert_eq!(parent.value(), Point { x: 7, y: 2 });

        // A string does not fit back into the struct.
        let y = factory.cursor::<Value>("y").unwrap();
        y.set(json!("wide"));

        assert_eq!(y.value(), json!("wide"));
        assert_eq!(parent.value(), Point { x: 7, y: 2 });
        assert_eq!(*seen.lock(), vec![true]);
    }

    #[test]
    fn cursors_nest() {
        let parent = doc(json!({"outer": {"inner": 1, "other": true}}));
        let factory = CursorFactory::from_handle(&parent);
        let outer = factory.cursor::<Value>("outer").unwrap();

        let nested = CursorFactory::from_handle(&outer);
        let inner = nested.cursor::<i64>("inner").unwrap();
        inner.set(2);

        assert_eq!(outer.value(), json!({"inner": 2, "other": true}));
        assert_eq!(parent.value(), json!({"outer": {"inner": 2, "other": true}}));
    }

    #[test]
    fn rebase_picks_up_outside_changes() {
        let parent = doc(json!({"a": 1, "b": 2}));
        let factory = CursorFactory::from_handle(&parent);
        let a = factory.cursor::<i64>("a").unwrap();

        parent.set(json!({"a": 1, "b": 3}));
        factory.rebase(parent.value());
        a.set(5);

        assert_eq!(parent.value(), json!({"a": 5, "b": 3}));
    }
}
