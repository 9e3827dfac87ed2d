//! Value shapes and the composer's one-level merge.

use crate::error::SyncResult;
use crate::value::StateValue;
use serde_json::{Map, Value};

/// The shape of a JSON value, resolved once before merging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape<'a> {
    /// Null, bool, number or string.
    Scalar(&'a Value),
    /// An object.
    Record(&'a Map<String, Value>),
    /// An array.
    Collection(&'a [Value]),
}

impl<'a> Shape<'a> {
    /// Classifies `value`.
    pub fn of(value: &'a Value) -> Self {
        match value {
            Value::Object(map) => Shape::Record(map),
            Value::Array(items) => Shape::Collection(items),
            other => Shape::Scalar(other),
        }
    }

    /// Returns true for records.
    pub fn is_record(&self) -> bool {
        matches!(self, Shape::Record(_))
    }
}

/// Merges `patch` into `current` one level deep.
///
/// Two records combine key by key with the patch winning. Any other pair of
/// shapes is replaced by the patch; collections are not spliced.
pub fn shallow_merge(current: &Value, patch: Value) -> Value {
    match (Shape::of(current), patch) {
        (Shape::Record(base), Value::Object(fields)) => {
            let mut merged = base.clone();
            merged.extend(fields);
            Value::Object(merged)
        }
        (_, patch) => patch,
    }
}

/// Structural identity of a value, used to detect drift.
pub fn fingerprint<V: StateValue>(value: &V) -> SyncResult<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Applies [`shallow_merge`] to typed values.
///
/// Returns `Ok(None)` when the shapes call for an outright replacement.
pub fn merge_state<V: StateValue>(current: &V, patch: &V) -> SyncResult<Option<V>> {
    let current = serde_json::to_value(current)?;
    let patch = serde_json::to_value(patch)?;

    if !(Shape::of(&current).is_record() && Shape::of(&patch).is_record()) {
        return Ok(None);
    }

    let merged = shallow_merge(&current, patch);
    Ok(Some(serde_json::from_value(merged)?))
}
