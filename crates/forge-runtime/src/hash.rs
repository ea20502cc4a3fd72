//! Structural hashing of configuration trees: equal structural content
//! always hashes equal, regardless of object key order.
//!
//! Object keys are sorted before hashing so insertion order never affects
//! the result; arrays stay order-sensitive since sequence order is part of
//! a config's structure.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde_json::Value;

/// Deterministic fingerprint of `value`'s structural shape, independent of
/// object key ordering.
pub fn structural_hash(value: &Value) -> String {
    let mut hasher = DefaultHasher::new();
    hash_value(value, &mut hasher);
    format!("{:016x}", hasher.finish())
}

fn hash_value<H: Hasher>(value: &Value, hasher: &mut H) {
    match value {
        Value::Null => hasher.write_u8(0),
        Value::Bool(b) => {
            hasher.write_u8(1);
            b.hash(hasher);
        }
        Value::Number(n) => {
            hasher.write_u8(2);
            // Compared by value, not by representation — "1" and "1.0" hash
            // identically since both parse to the same `Number`.
            n.to_string().hash(hasher);
        }
        Value::String(s) => {
            hasher.write_u8(3);
            s.hash(hasher);
        }
        Value::Array(items) => {
            hasher.write_u8(4);
            items.len().hash(hasher);
            for item in items {
                hash_value(item, hasher);
            }
        }
        Value::Object(map) => {
            hasher.write_u8(5);
            let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
            keys.sort_unstable();
            keys.len().hash(hasher);
            for key in keys {
                key.hash(hasher);
                hash_value(&map[key], hasher);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_affect_hash() {
        let a = json!({"url": "u", "timeout": 5});
        let b = json!({"timeout": 5, "url": "u"});
        assert_eq!(structural_hash(&a), structural_hash(&b));
    }

    #[test]
    fn different_values_hash_differently() {
        let a = json!({"url": "u1"});
        let b = json!({"url": "u2"});
        assert_ne!(structural_hash(&a), structural_hash(&b));
    }

    #[test]
    fn nested_key_order_does_not_affect_hash() {
        let a = json!({"outer": {"a": 1, "b": 2}});
        let b = json!({"outer": {"b": 2, "a": 1}});
        assert_eq!(structural_hash(&a), structural_hash(&b));
    }

    #[test]
    fn array_order_is_significant() {
        let a = json!({"items": [1, 2]});
        let b = json!({"items": [2, 1]});
        assert_ne!(structural_hash(&a), structural_hash(&b));
    }
}
