//! Property-based test generators using proptest.

use proptest::prelude::*;
use serde_json::{Map, Value};

/// Strategy for generating store keys.
pub fn key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("(/[a-z0-9_-]{1,12}){1,4}").expect("Invalid regex")
}

/// Strategy for generating JSON scalars.
pub fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9 ]{0,16}".prop_map(Value::String),
    ]
}

/// Strategy for generating nested JSON values.
pub fn json_strategy() -> impl Strategy<Value = Value> {
    scalar_strategy().prop_recursive(3, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..6)
                .prop_map(|fields| Value::Object(fields.into_iter().collect())),
        ]
    })
}

/// Strategy for generating flat JSON records.
pub fn record_strategy() -> impl Strategy<Value = Value> {
    prop::collection::btree_map("[a-z]{1,6}", scalar_strategy(), 0..8)
        .prop_map(|fields| Value::Object(fields.into_iter().collect::<Map<String, Value>>()))
}
