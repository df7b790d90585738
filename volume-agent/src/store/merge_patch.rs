//! JSON merge patches (RFC 7386) computed from a fetched copy of a record.
//!
//! Sending only the fields that differ from what was fetched leaves fields
//! changed by other writers in the meantime alone.

use serde_json::{Map, Value};

/// Patch that turns `original` into `modified`.
///
/// Keys missing from `modified` become `null`; unchanged keys are omitted;
/// nested objects are diffed recursively. Anything that is not an object on
/// both sides is replaced wholesale.
pub fn diff(original: &Value, modified: &Value) -> Value {
    let (Value::Object(original), Value::Object(modified)) = (original, modified) else {
        return modified.clone();
    };

    let mut patch = Map::new();

    for (key, old) in original {
        match modified.get(key) {
            None => {
                patch.insert(key.clone(), Value::Null);
            }
            Some(new) if new != old => {
                patch.insert(key.clone(), diff(old, new));
            }
            Some(_) => {}
        }
    }

    for (key, new) in modified {
        if !original.contains_key(key) {
            patch.insert(key.clone(), new.clone());
        }
    }

    Value::Object(patch)
}

/// Apply a merge patch to `target` in place.
pub fn apply(target: &mut Value, patch: &Value) {
    let Value::Object(changes) = patch else {
        *target = patch.clone();
        return;
    };

    if !target.is_object() {
        *target = Value::Object(Map::new());
    }

    if let Value::Object(fields) = target {
        for (key, change) in changes {
            if change.is_null() {
                fields.remove(key);
            } else {
                apply(fields.entry(key.clone()).or_insert(Value::Null), change);
            }
        }
    }
}

/// True when the patch would change nothing.
pub fn is_empty(patch: &Value) -> bool {
    matches!(patch, Value::Object(fields) if fields.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_diff_only_changed_fields() {
        let original = json!({
            "metadata": {"name": "pvb-1", "labels": {"a": "1"}},
            "status": {"phase": "InProgress", "path": "/host_pods/x"}
        });
        let modified = json!({
            "metadata": {"name": "pvb-1", "labels": {"a": "1"}},
            "status": {"phase": "Failed", "path": "/host_pods/x", "message": "boom"}
        });

        assert_eq!(
            diff(&original, &modified),
            json!({"status": {"phase": "Failed", "message": "boom"}})
        );
    }

    #[test]
    fn test_diff_removed_key_is_null() {
        let patch = diff(&json!({"a": 1, "b": 2}), &json!({"a": 1}));
        assert_eq!(patch, json!({"b": null}));
    }

    #[test]
    fn test_diff_identical_is_empty() {
        let value = json!({"a": {"b": [1, 2]}});
        assert!(is_empty(&diff(&value, &value)));
    }

    #[test]
    fn test_arrays_are_replaced() {
        let patch = diff(&json!({"tags": ["a", "b"]}), &json!({"tags": ["a"]}));
        assert_eq!(patch, json!({"tags": ["a"]}));
    }

    #[test]
    fn test_apply_keeps_unrelated_changes() {
        let original = json!({"spec": {"node": "a"}, "status": {"phase": "InProgress"}});
        let modified = json!({"spec": {"node": "a"}, "status": {"phase": "Failed"}});
        let patch = diff(&original, &modified);

        // Someone else updated the record after it was fetched.
        let mut stored = json!({
            "spec": {"node": "a"},
            "status": {"phase": "InProgress", "progress": {"bytesDone": 10}}
        });
        apply(&mut stored, &patch);

        assert_eq!(
            stored,
            json!({
                "spec": {"node": "a"},
                "status": {"phase": "Failed", "progress": {"bytesDone": 10}}
            })
        );
    }

    #[test]
    fn test_apply_removes_null_keys() {
        let mut target = json!({"a": 1, "b": {"c": 2, "d": 3}});
        apply(&mut target, &json!({"a": null, "b": {"c": null}}));
        assert_eq!(target, json!({"b": {"d": 3}}));
    }
}
