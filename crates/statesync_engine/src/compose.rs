//! Two-source composition.
//!
//! [`compose`] merges two handles into one. The order of the sources is
//! significant: when they disagree, the **second** source is authoritative.
//!
//! - If the second source changed on its own, its value overwrites the
//!   first source and becomes the composed value.
//! - If only the first source changed on its own, the composed value adopts
//!   it but the second source is left alone.
//! - A set through the composed handle goes to both.
//!
//! Composing `(local cache, remote)` therefore gives a cache that serves
//! as an offline fallback, is overwritten whenever the server value moves,
//! and never pushes its own stale contents to the server.
//!
//! ```rust
//! use serde_json::json;
//! use statesync_engine::{compose, sync, MemoryStore, StateHandle, SyncConfig};
//!
//! let cache = sync("/prefs", json!({"theme": "dark"}), MemoryStore::new(), SyncConfig::isolated());
//! let remote = sync("/prefs", json!({"theme": "dark"}), MemoryStore::new(), SyncConfig::isolated());
//! let prefs = compose(cache.clone(), remote.clone());
//!
//! prefs.set(json!({"font": "mono"}));
//! assert_eq!(remote.value(), json!({"theme": "dark", "font": "mono"}));
//! assert_eq!(cache.value(), remote.value());
//! ```

use crate::error::{log_error, ErrorHook};
use crate::shape::{fingerprint, merge_state};
use crate::value::{StateHandle, StateUpdate, StateValue};
use parking_lot::Mutex;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;

struct Snapshot<V> {
    value: V,
    /// Payload of the most recent write this composer issued.
    last_written: V,
    /// An update function was fanned out; read the result back from the
    /// second source on the next pass.
    adopt_on_next_pass: bool,
}

struct Inner<V, A, B> {
    first: A,
    second: B,
    snapshot: Mutex<Snapshot<V>>,
    on_error: ErrorHook,
}

/// Outcome of one reconciliation pass.
enum Drift<V> {
    None,
    First(V),
    Second(V),
}

/// A handle merging two sources. See the [module docs](self).
pub struct Composed<V, A, B> {
    inner: Arc<Inner<V, A, B>>,
    _value: PhantomData<fn() -> V>,
}

/// Composes two handles; `second` wins on independent drift.
pub fn compose<V, A, B>(first: A, second: B) -> Composed<V, A, B>
where
    V: StateValue,
    A: StateHandle<V>,
    B: StateHandle<V>,
{
    Composed::with_error_hook(first, second, log_error())
}

impl<V, A, B> Composed<V, A, B>
where
    V: StateValue,
    A: StateHandle<V>,
    B: StateHandle<V>,
{
    /// Composes two handles, reporting serialization failures to `on_error`.
    pub fn with_error_hook(first: A, second: B, on_error: ErrorHook) -> Self {
        let seed = second.value();
        Self {
            inner: Arc::new(Inner {
                first,
                second,
                snapshot: Mutex::new(Snapshot {
                    value: seed.clone(),
                    last_written: seed,
                    adopt_on_next_pass: false,
                }),
                on_error,
            }),
            _value: PhantomData,
        }
    }

    /// The subordinate source.
    pub fn first(&self) -> &A {
        &self.inner.first
    }

    /// The authoritative source.
    pub fn second(&self) -> &B {
        &self.inner.second
    }

    /// Returns the payload of the last write this composer issued.
    pub fn last_written(&self) -> V {
        self.inner.snapshot.lock().last_written.clone()
    }

    fn fingerprint(&self, value: &V) -> Option<Value> {
        match fingerprint(value) {
            Ok(print) => Some(print),
            Err(err) => {
                (self.inner.on_error)(&err);
                None
            }
        }
    }

    /// Runs one reconciliation pass and returns the merged value.
    ///
    /// The pass is skipped when any value cannot be fingerprinted; the
    /// failure goes to the error hook and the previous value is returned.
    pub fn reconcile(&self) -> V {
        let inner = &self.inner;
        let data_first = inner.first.value();
        let data_second = inner.second.value();

        let last_written = {
            let mut snapshot = inner.snapshot.lock();
            if std::mem::take(&mut snapshot.adopt_on_next_pass) {
                snapshot.last_written = data_second.clone();
                snapshot.value = data_second.clone();
            }
            snapshot.last_written.clone()
        };

        // Unlocked: the hook may read this handle.
        let prints = (
            self.fingerprint(&data_first),
            self.fingerprint(&data_second),
            self.fingerprint(&last_written),
        );
        let (Some(print_first), Some(print_second), Some(print_last)) = prints else {
            tracing::warn!("cannot fingerprint a source, skipping reconciliation");
            return inner.snapshot.lock().value.clone();
        };

        let drift = if print_first == print_second {
            Drift::None
        } else if print_second != print_last {
            Drift::Second(data_second)
        } else if print_first != print_last {
            Drift::First(data_first)
        } else {
            Drift::None
        };

        match drift {
            Drift::Second(value) => {
                {
                    let mut snapshot = inner.snapshot.lock();
                    snapshot.last_written = value.clone();
                    snapshot.value = value.clone();
                }
                tracing::debug!("second source drifted, overwriting first");
                inner.first.set(value);
            }
            Drift::First(value) => {
                inner.snapshot.lock().value = value;
                tracing::debug!("first source drifted, adopting without propagation");
            }
            Drift::None => {}
        }

        inner.snapshot.lock().value.clone()
    }
}

impl<V, A, B> StateHandle<V> for Composed<V, A, B>
where
    V: StateValue,
    A: StateHandle<V>,
    B: StateHandle<V>,
{
    fn value(&self) -> V {
        self.reconcile()
    }

    fn set_state(&self, update: StateUpdate<V>) {
        let inner = &self.inner;
        match update {
            StateUpdate::Update(f) => {
                // The result is only known to the sources.
                inner.snapshot.lock().adopt_on_next_pass = true;
                inner.first.set_state(StateUpdate::Update(Arc::clone(&f)));
                inner.second.set_state(StateUpdate::Update(f));
            }
            StateUpdate::Set(patch) => {
                let current = inner.snapshot.lock().value.clone();
                let merged = match merge_state(&current, &patch) {
                    Ok(Some(merged)) => merged,
                    Ok(None) => patch,
                    Err(err) => {
                        (inner.on_error)(&err);
                        patch
                    }
                };
                {
                    let mut snapshot = inner.snapshot.lock();
                    snapshot.last_written = merged.clone();
                    snapshot.value = merged.clone();
                }

                inner.first.set(merged.clone());
                inner.second.set(merged);
            }
        }
    }
}

impl<V, A, B> Clone for Composed<V, A, B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _value: PhantomData,
        }
    }
}
