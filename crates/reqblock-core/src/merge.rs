//! Deep merge of request options.

use serde_json::Value as JsonValue;

/// Merge `overrides` on top of `base` and return the result.
///
/// - objects merge key by key, recursively
/// - arrays concatenate, `base` items first
/// - anything else is taken from `overrides`
pub fn deep_merge(base: &JsonValue, overrides: &JsonValue) -> JsonValue {
    match (base, overrides) {
        (JsonValue::Object(base), JsonValue::Object(overrides)) => {
            let mut merged = base.clone();
            for (key, value) in overrides {
                let next = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), next);
            }
            JsonValue::Object(merged)
        }
        (JsonValue::Array(base), JsonValue::Array(overrides)) => {
            JsonValue::Array(base.iter().chain(overrides).cloned().collect())
        }
        (_, overrides) => overrides.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_objects_merge() {
        let base = json!({"headers": {"accept": "application/json", "x-app": "web"}});
        let overrides = json!({"headers": {"x-app": "ssr"}, "method": "POST"});

        assert_eq!(
            deep_merge(&base, &overrides),
            json!({
                "headers": {"accept": "application/json", "x-app": "ssr"},
                "method": "POST"
            })
        );
    }

    #[test]
    fn test_arrays_concatenate() {
        let merged = deep_merge(&json!({"tags": ["a"]}), &json!({"tags": ["b", "c"]}));
        assert_eq!(merged, json!({"tags": ["a", "b", "c"]}));
    }

    #[test]
    fn test_mismatched_kinds_take_override() {
        assert_eq!(
            deep_merge(&json!({"x": {"deep": 1}}), &json!({"x": [1]})),
            json!({"x": [1]})
        );
        assert_eq!(deep_merge(&json!({"a": 1}), &json!(null)), json!(null));
    }

    #[test]
    fn test_base_is_left_untouched() {
        let base = json!({"a": {"b": 1}});
        let _ = deep_merge(&base, &json!({"a": {"c": 2}}));
        assert_eq!(base, json!({"a": {"b": 1}}));
    }
}
