//! The value/setter calling contract shared by every handle.
//!
//! Engine cells, composers and cursors all implement [`StateHandle`], so
//! the output of one can be the input of another.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Values that can live in a synchronized cell.
///
/// Anything cloneable and JSON-serializable qualifies; `Clone` is the deep
/// clone a cursor relies on when patching its parent.
pub trait StateValue: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> StateValue for T where T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

/// A function deriving the next value from the previous one.
pub type UpdateFn<V> = Arc<dyn Fn(&V) -> V + Send + Sync>;

/// A command sent to a setter.
pub enum StateUpdate<V> {
    /// Replace the value outright.
    Set(V),
    /// Derive the value from the previous one.
    Update(UpdateFn<V>),
}

impl<V> StateUpdate<V> {
    /// Wraps a derive-from-previous function.
    pub fn update<F>(f: F) -> Self
    where
        F: Fn(&V) -> V + Send + Sync + 'static,
    {
        Self::Update(Arc::new(f))
    }

    /// Resolves the command against the previous value.
    pub fn apply(self, previous: &V) -> V {
        match self {
            Self::Set(value) => value,
            Self::Update(f) => f(previous),
        }
    }
}

impl<V: Clone> Clone for StateUpdate<V> {
    fn clone(&self) -> Self {
        match self {
            Self::Set(value) => Self::Set(value.clone()),
            Self::Update(f) => Self::Update(Arc::clone(f)),
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for StateUpdate<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Set(value) => f.debug_tuple("Set").field(value).finish(),
            Self::Update(_) => f.write_str("Update(..)"),
        }
    }
}

impl<V> From<V> for StateUpdate<V> {
    fn from(value: V) -> Self {
        Self::Set(value)
    }
}

/// A readable, writable piece of synchronized state.
pub trait StateHandle<V>: Send + Sync {
    /// Returns the current value.
    ///
    /// For composed handles this is also a reconciliation pass.
    fn value(&self) -> V;

    /// Applies an update. Never fails: store errors go to the error hook.
    fn set_state(&self, update: StateUpdate<V>);

    /// Replaces the value.
    fn set(&self, value: V) {
        self.set_state(StateUpdate::Set(value));
    }

    /// Derives the value from the previous one.
    fn update<F>(&self, f: F)
    where
        F: Fn(&V) -> V + Send + Sync + 'static,
        Self: Sized,
    {
        self.set_state(StateUpdate::update(f));
    }

    /// Returns a detached setter bound to this handle.
    fn setter(&self) -> Setter<V>
    where
        Self: Clone + Sized + 'static,
        V: 'static,
    {
        let handle = self.clone();
        Setter::new(move |update| handle.set_state(update))
    }

    /// Returns the `(value, setter)` pair.
    fn state(&self) -> (V, Setter<V>)
    where
        Self: Clone + Sized + 'static,
        V: 'static,
    {
        (self.value(), self.setter())
    }
}

impl<V, H> StateHandle<V> for Arc<H>
where
    H: StateHandle<V> + ?Sized,
{
    fn value(&self) -> V {
        (**self).value()
    }

    fn set_state(&self, update: StateUpdate<V>) {
        (**self).set_state(update);
    }
}

/// A cloneable setter detached from its handle.
pub struct Setter<V> {
    inner: Arc<dyn Fn(StateUpdate<V>) + Send + Sync>,
}

impl<V> Setter<V> {
    /// Wraps a function receiving updates.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(StateUpdate<V>) + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    /// Sends an update.
    pub fn call(&self, update: StateUpdate<V>) {
        (self.inner)(update);
    }

    /// Replaces the value.
    pub fn set(&self, value: V) {
        self.call(StateUpdate::Set(value));
    }

    /// Derives the value from the previous one.
    pub fn update<F>(&self, f: F)
    where
        F: Fn(&V) -> V + Send + Sync + 'static,
    {
        self.call(StateUpdate::update(f));
    }
}

impl<V> Clone for Setter<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> fmt::Debug for Setter<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Setter(..)")
    }
}
