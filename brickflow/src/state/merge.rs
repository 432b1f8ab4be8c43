//! Merge strategies for state writes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// How a write combines with the previous value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Discard the previous value.
    Replace,
    /// Overwrite top-level keys.
    #[default]
    Shallow,
    /// Recursive merge; arrays merge positionally.
    Deep,
}

/// Recursively merges `source` into `target`.
///
/// Objects merge key by key. Arrays merge element by element, so `[1]` over
/// `[42, 43]` gives `[1, 43]`. Any other pairing replaces the target.
pub fn deep_merge(target: &mut Value, source: &Value) {
    match (target, source) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (Value::Array(target), Value::Array(source)) => {
            for (index, value) in source.iter().enumerate() {
                match target.get_mut(index) {
                    Some(existing) => deep_merge(existing, value),
                    None => target.push(value.clone()),
                }
            }
        }
        (target, source) => *target = source.clone(),
    }
}

/// Combines `previous` and `data` according to `strategy`.
#[must_use]
pub fn merge_state(previous: &Map<String, Value>, data: &Map<String, Value>, strategy: MergeStrategy) -> Map<String, Value> {
    match strategy {
        MergeStrategy::Replace => data.clone(),
        MergeStrategy::Shallow => {
            let mut merged = previous.clone();
            for (key, value) in data {
                merged.insert(key.clone(), value.clone());
            }
            merged
        }
        MergeStrategy::Deep => {
            let mut merged = Value::Object(previous.clone());
            deep_merge(&mut merged, &Value::Object(data.clone()));
            match merged {
                Value::Object(map) => map,
                _ => data.clone(),
            }
        }
    }
}
