//! Conversion between decoded JSON and typed storage values.
//!
//! Both directions are total: every JSON value has exactly one storage kind,
//! and every storage value renders back to JSON. Numbers keep whatever text
//! the JSON decoder produced for them, so integers stay integral and floats
//! keep their shortest round-trip form.

use crate::value::{Item, StorageValue};
use serde_json::{Map, Number, Value};

/// Classify a JSON value into its storage representation
pub fn to_storage_value(value: &Value) -> StorageValue {
    match value {
        Value::String(s) => StorageValue::S(s.clone()),
        Value::Number(n) => StorageValue::N(n.to_string()),
        Value::Bool(b) => StorageValue::Bool(*b),
        Value::Array(values) => StorageValue::L(values.iter().map(to_storage_value).collect()),
        Value::Object(map) => StorageValue::M(to_storage_item(map)),
        Value::Null => StorageValue::Null,
    }
}

/// Convert a JSON object into a storable item
pub fn to_storage_item(map: &Map<String, Value>) -> Item {
    map.iter()
        .map(|(key, value)| (key.clone(), to_storage_value(value)))
        .collect()
}

/// Render a storage value as JSON.
///
/// Number text that is not valid JSON (e.g. `NaN` written by another client)
/// comes back as a string rather than being dropped.
pub fn to_json(value: &StorageValue) -> Value {
    match value {
        StorageValue::S(s) => Value::String(s.clone()),
        StorageValue::N(n) => number_from_text(n)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(n.clone())),
        StorageValue::Bool(b) => Value::Bool(*b),
        StorageValue::L(values) => Value::Array(values.iter().map(to_json).collect()),
        StorageValue::M(map) => item_to_json(map),
        StorageValue::Null => Value::Null,
    }
}

/// Render a stored item as a JSON object
pub fn item_to_json(item: &Item) -> Value {
    Value::Object(
        item.iter()
            .map(|(key, value)| (key.clone(), to_json(value)))
            .collect(),
    )
}

fn number_from_text(text: &str) -> Option<Number> {
    serde_json::from_str::<Number>(text.trim()).ok()
}
