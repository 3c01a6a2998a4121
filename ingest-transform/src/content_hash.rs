//! Chunk content hashing, grounded on
//! `base_chunk.py::compute_chunk_content_hash`: SHA-256 over
//! `{"content": ..., "metadata": ...}` with metadata keys sorted, so the
//! hash is stable across re-serializations of the same logical metadata.

use sha2::{Digest, Sha256};

pub fn compute_chunk_content_hash(content: &str, metadata: &serde_json::Value) -> [u8; 32] {
    let sorted_metadata = sort_object_keys(metadata);
    let payload = serde_json::json!({ "content": content, "metadata": sorted_metadata });
    let mut hasher = Sha256::new();
    hasher.update(payload.to_string().as_bytes());
    hasher.finalize().into()
}

fn sort_object_keys(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let sorted: std::collections::BTreeMap<String, serde_json::Value> =
                map.iter().map(|(k, v)| (k.clone(), sort_object_keys(v))).collect();
            serde_json::json!(sorted)
        }
        serde_json::Value::Array(items) => serde_json::Value::Array(items.iter().map(sort_object_keys).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_regardless_of_key_order() {
        let a = serde_json::json!({"b": 1, "a": 2});
        let b = serde_json::json!({"a": 2, "b": 1});
        assert_eq!(compute_chunk_content_hash("hello", &a), compute_chunk_content_hash("hello", &b));
    }

    #[test]
    fn hash_changes_with_content() {
        let meta = serde_json::json!({});
        assert_ne!(compute_chunk_content_hash("hello", &meta), compute_chunk_content_hash("world", &meta));
    }
}
