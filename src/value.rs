//! Value Model: the dynamic JSON-like data exchanged on the bus.
//!
//! `Value` is `serde_json::Value` built with `preserve_order`: object maps keep
//! insertion order when re-serialized, while equality ignores key order.
//! Integers are kept exactly as `i64`/`u64`; everything else is `f64`.

pub use serde_json::{json, Map, Number, Value};

/// Mask written in place of redacted fields.
pub const REDACTED: &str = "***";

/// Short name of the runtime shape of a value.
pub fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Copy of `value` with every object entry whose key is in `fields` masked,
/// at any depth.
pub fn redact<S: AsRef<str>>(value: &Value, fields: &[S]) -> Value {
    if fields.is_empty() {
        return value.clone();
    }
    match value {
        Value::Object(object) => Value::Object(
            object
                .iter()
                .map(|(key, inner)| {
                    let masked = if fields.iter().any(|f| f.as_ref() == key) {
                        Value::String(REDACTED.to_string())
                    } else {
                        redact(inner, fields)
                    };
                    (key.clone(), masked)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(|item| redact(item, fields)).collect()),
        other => other.clone(),
    }
}

/// Deep-merge `overlay` into `target`. Objects merge key by key; anything
/// else in `overlay` replaces the target value.
pub fn merge_in(target: &mut Value, overlay: Value) {
    match (target, overlay) {
        (Value::Object(base), Value::Object(layer)) => {
            for (key, value) in layer {
                match base.get_mut(&key) {
                    Some(existing) => merge_in(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_object_equality_ignores_key_order() {
        let a = json!({"x": 1, "y": 2});
        let b = json!({"y": 2, "x": 1});
        assert_eq!(a, b);
        assert_ne!(json!([1, 2]), json!([2, 1]));
    }

    #[test]
    fn test_insertion_order_preserved() {
        let value = json!({"zeta": 1, "alpha": 2, "mid": 3});
        assert_eq!(
            serde_json::to_string(&value).unwrap(),
            r#"{"zeta":1,"alpha":2,"mid":3}"#
        );
    }

    #[test]
    fn test_large_integers_exact() {
        let big = (1i64 << 53) + 1;
        let value: Value = serde_json::from_str(&big.to_string()).unwrap();
        assert_eq!(value.as_i64(), Some(big));
    }

    #[test]
    fn test_redact_nested() {
        let value = json!({
            "user": {"name": "ann", "password": "hunter2"},
            "tokens": [{"password": "x"}],
        });
        let masked = redact(&value, &["password"]);
        assert_eq!(
            masked,
            json!({
                "user": {"name": "ann", "password": "***"},
                "tokens": [{"password": "***"}],
            })
        );
        // Original untouched.
        assert_eq!(value["user"]["password"], "hunter2");
    }

    #[test]
    fn test_merge_in() {
        let mut base = json!({"bus": {"a": 1, "b": 2}, "list": [1]});
        merge_in(&mut base, json!({"bus": {"b": 3}, "list": [2], "new": true}));
        assert_eq!(base, json!({"bus": {"a": 1, "b": 3}, "list": [2], "new": true}));
    }

    #[test]
    fn test_kind_name() {
        assert_eq!(kind_name(&json!([])), "array");
        assert_eq!(kind_name(&json!(null)), "null");
        assert_eq!(kind_name(&json!({"id": 1})), "object");
    }
}
