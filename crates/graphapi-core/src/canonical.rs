//! Canonical JSON serialization and SHA-256 digest production.
//!
//! Bundle checksums are defined as the SHA-256 hex digest of a canonical
//! JSON payload: object keys sorted recursively, compact separators, no
//! trailing whitespace. Two payloads with the same logical content always
//! hash to the same digest regardless of map insertion order, which is
//! what makes checksums usable as ETag keys and as tamper detection for
//! pinned references.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Serializes a JSON value canonically: keys sorted recursively, compact
/// separators, UTF-8.
///
/// `serde_json::Map` is backed by a `BTreeMap` under the default feature
/// set, but the sort is applied explicitly so the output stays canonical
/// even if a dependency turns on `preserve_order`.
pub fn canonical_json(value: &Value) -> String {
    serde_json::to_string(&canonical_value(value.clone()))
        .unwrap_or_else(|_| String::from("null"))
}

/// Recursively rebuilds a value with object keys in sorted order.
fn canonical_value(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (key, inner) in entries {
                sorted.insert(key, canonical_value(inner));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonical_value).collect()),
        other => other,
    }
}

/// Returns the lowercase SHA-256 hex digest of `input`.
pub fn sha256_hex(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    format!("{:x}", digest)
}

/// Returns the checksum of a JSON payload: `sha256_hex(canonical_json(value))`.
pub fn checksum_of(value: &Value) -> String {
    sha256_hex(&canonical_json(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn canonical_json_sorts_keys_recursively() {
        let value: Value =
            serde_json::from_str(r#"{"b":1,"a":{"z":true,"m":[{"y":2,"x":1}]}}"#).unwrap();
        assert_eq!(
            canonical_json(&value),
            r#"{"a":{"m":[{"x":1,"y":2}],"z":true},"b":1}"#
        );
    }

    #[test]
    fn checksum_ignores_key_insertion_order() {
        let a: Value = serde_json::from_str(r#"{"router":"mdi:router","gateway":"mdi:gate"}"#)
            .unwrap();
        let b: Value = serde_json::from_str(r#"{"gateway":"mdi:gate","router":"mdi:router"}"#)
            .unwrap();
        assert_eq!(checksum_of(&a), checksum_of(&b));
    }

    #[test]
    fn sha256_hex_matches_known_vector() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn digest_is_64_lowercase_hex_chars() {
        let digest = checksum_of(&json!({"key": "value"}));
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    fn arb_json(depth: u32) -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            "[a-z0-9_-]{0,12}".prop_map(Value::from),
        ];
        leaf.prop_recursive(depth, 64, 8, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
                prop::collection::btree_map("[a-z_]{1,8}", inner, 0..6)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn canonicalization_is_idempotent(value in arb_json(3)) {
            let once = canonical_json(&value);
            let reparsed: Value = serde_json::from_str(&once).unwrap();
            prop_assert_eq!(once, canonical_json(&reparsed));
        }

        #[test]
        fn round_trip_preserves_checksum(value in arb_json(3)) {
            let reparsed: Value = serde_json::from_str(&canonical_json(&value)).unwrap();
            prop_assert_eq!(checksum_of(&value), checksum_of(&reparsed));
        }
    }
}
