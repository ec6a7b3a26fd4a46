//! Deep merge of two JSON documents
//!
//! The patch wins every conflict it can express. Objects merge key by key,
//! arrays can be patched element-wise by an object keyed with stringified
//! indices, and anything else is replaced outright.

use serde_json::{Map, Value};

use crate::error::MergeError;

/// Merge `patch` over `base` and return the result. Neither input is touched.
///
/// A top-level patch that is not an object leaves `base` unchanged.
pub fn merge_values(base: &Value, patch: &Value) -> Value {
    match patch {
        Value::Object(patch) => merge_object(base, patch),
        _ => base.clone(),
    }
}

/// Decode both buffers, merge them, and re-encode the result.
///
/// Numbers keep their original text (`arbitrary_precision`), so integers are
/// never coerced through `f64`.
pub fn merge_bytes(data: &[u8], patch: &[u8]) -> Result<Vec<u8>, MergeError> {
    let data: Value = serde_json::from_slice(data).map_err(MergeError::Data)?;
    let patch: Value = serde_json::from_slice(patch).map_err(MergeError::Patch)?;

    serde_json::to_vec(&merge_values(&data, &patch)).map_err(MergeError::Encode)
}

fn merge_object(base: &Value, patch: &Map<String, Value>) -> Value {
    match base {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .enumerate()
                .map(|(index, item)| merge_entry(item, patch.get(&index.to_string())))
                .collect(),
        ),
        Value::Object(fields) => {
            let mut merged: Map<String, Value> = fields
                .iter()
                .map(|(key, value)| (key.clone(), merge_entry(value, patch.get(key))))
                .collect();
            for (key, value) in patch {
                if !merged.contains_key(key) {
                    merged.insert(key.clone(), value.clone());
                }
            }
            Value::Object(merged)
        }
        _ => base.clone(),
    }
}

fn merge_entry(base: &Value, patch: Option<&Value>) -> Value {
    let Some(patch) = patch else {
        return base.clone();
    };

    match (base, patch) {
        (Value::Object(_) | Value::Array(_), Value::Object(fields)) => merge_object(base, fields),
        // An object is only ever refined, never replaced by a scalar or array.
        (Value::Object(_), _) => base.clone(),
        _ => patch.clone(),
    }
}
