//! Property bag hashing for change detection.
//!
//! Bags are canonicalized before hashing: object keys are sorted at every
//! depth, array elements keep their order.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::construct::Properties;

/// Length of a stored properties hash, in hex characters.
pub const HASH_LEN: usize = 16;

/// Hasher for property bags.
#[derive(Debug, Default)]
pub struct PropertiesHasher;

impl PropertiesHasher {
    /// Creates a new hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the truncated hex digest of a property bag.
    #[must_use]
    pub fn hash(&self, properties: &Properties) -> String {
        let canonical = canonicalize(&Value::Object(properties.clone()));
        let mut hasher = Sha256::new();
        hasher.update(canonical.to_string().as_bytes());
        let mut digest = hex::encode(hasher.finalize());
        digest.truncate(HASH_LEN);
        digest
    }

    /// Computes a short hash (first 8 characters) for display purposes.
    #[must_use]
    pub fn short_hash(&self, hash: &str) -> String {
        hash.chars().take(8).collect()
    }

    /// Compares two hashes to determine if they are equal.
    #[must_use]
    pub fn hashes_match(hash1: &str, hash2: &str) -> bool {
        if hash1.len() != hash2.len() {
            return false;
        }

        hash1
            .bytes()
            .zip(hash2.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

/// Rebuilds `value` with every object's keys in sorted order.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let sorted: Map<String, Value> = entries
                .into_iter()
                .map(|(k, v)| (k.clone(), canonicalize(v)))
                .collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}
