//! Structural helpers over `serde_json::Value` trees.

use serde_json::Value;

/// Deep-merges `overlay` into `base`.
///
/// Objects merge key by key; scalars and arrays from `overlay` replace the
/// base value wholesale.
pub fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => {
                        base_map.insert(key.clone(), overlay_value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

/// Returns true when every leaf of `desired` is present and equal in `actual`.
///
/// Arrays compare as whole values. Extra keys in `actual` are ignored.
pub fn is_subset(desired: &Value, actual: &Value) -> bool {
    match (desired, actual) {
        (Value::Object(desired_map), Value::Object(actual_map)) => {
            desired_map.iter().all(|(key, desired_value)| {
                actual_map
                    .get(key)
                    .is_some_and(|actual_value| is_subset(desired_value, actual_value))
            })
        }
        (desired, actual) => desired == actual,
    }
}

/// Reads `properties.<key>` as a string, accepting numbers too.
pub fn property_str(document: &Value, key: &str) -> Option<String> {
    match document.get("properties")?.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
