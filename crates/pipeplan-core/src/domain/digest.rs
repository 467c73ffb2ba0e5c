//! Canonical JSON encoding and SHA-256 digests of domain values.

use serde::Serialize;
use sha2::{Digest, Sha256};

use super::error::DomainResult;

/// Recursively sort object keys so encoding does not depend on map order.
fn sort_keys(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().collect();
            keys.sort();

            let mut sorted = serde_json::Map::new();
            for key in keys {
                if let Some(v) = map.get(key) {
                    sorted.insert(key.to_string(), sort_keys(v));
                }
            }
            serde_json::Value::Object(sorted)
        }
        serde_json::Value::Array(arr) => serde_json::Value::Array(arr.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// Canonical (key-sorted, compact) JSON bytes of `value`.
pub fn canonical_json<T: Serialize>(value: &T) -> DomainResult<Vec<u8>> {
    let json = serde_json::to_value(value)?;
    Ok(serde_json::to_vec(&sort_keys(&json))?)
}

/// SHA-256 hex digest of the canonical JSON encoding of `value`.
pub fn compute_digest<T: Serialize>(value: &T) -> DomainResult<String> {
    let bytes = canonical_json(value)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_order_does_not_change_digest() {
        let a = json!({ "b": 1, "a": { "y": 2, "x": 3 } });
        let b = json!({ "a": { "x": 3, "y": 2 }, "b": 1 });
        assert_eq!(compute_digest(&a).unwrap(), compute_digest(&b).unwrap());
    }

    #[test]
    fn test_array_order_changes_digest() {
        let a = json!(["Source", "Build"]);
        let b = json!(["Build", "Source"]);
        assert_ne!(compute_digest(&a).unwrap(), compute_digest(&b).unwrap());
    }

    #[test]
    fn test_digest_is_sha256_hex() {
        let digest = compute_digest(&json!({ "k": "v" })).unwrap();
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
