//! Canonicalization for the ACT chain
//!
//! Deterministic serialization for computing digests. Entry content is
//! canonicalized (recursively sorted JSON keys) and hashed under a domain
//! tag before it is linked into the proposal chain or a Merkle tree.

use crate::error::LedgerResult;
use crate::types::{Digest, EntryId, WitnessId};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Domain separation tags
pub mod domain_tags {
    /// Entry content hashes
    pub const CONTENT: &str = "act:content:v1";
    /// Block hashes
    pub const BLOCK: &str = "act:block:v1";
    /// Merkle constants
    pub const MERKLE: &str = "act:merkle:v1";
}

/// Hash with domain separation (`tag || 0x00 || data`)
pub fn hash_with_domain(domain: &str, data: &[u8]) -> Digest {
    let mut tagged = Vec::with_capacity(domain.len() + 1 + data.len());
    tagged.extend_from_slice(domain.as_bytes());
    tagged.push(0x00);
    tagged.extend_from_slice(data);
    Digest::sha256(&tagged)
}

/// Placeholder vote signature
///
/// SHA-256 over `witness_id:entry_id:vote:timestamp`. Stands in for a real
/// signature from the signing layer.
pub fn vote_signature(
    witness_id: &WitnessId,
    entry_id: &EntryId,
    accept: bool,
    timestamp: &DateTime<Utc>,
) -> Digest {
    let msg = format!(
        "{}:{}:{}:{}",
        witness_id,
        entry_id,
        accept,
        timestamp.to_rfc3339()
    );
    Digest::sha256(msg.as_bytes())
}

/// Canonicalizer
#[derive(Debug, Clone, Copy, Default)]
pub struct Canonicalizer;

impl Canonicalizer {
    pub fn new() -> Self {
        Self
    }

    /// Canonicalize to bytes
    pub fn canonicalize<T: Serialize>(&self, value: &T) -> LedgerResult<Vec<u8>> {
        let json = serde_json::to_value(value)?;
        let sorted = Self::sort_json_keys(&json);
        Ok(serde_json::to_vec(&sorted)?)
    }

    /// Canonicalize and hash under the content domain
    pub fn content_hash<T: Serialize>(&self, value: &T) -> LedgerResult<Digest> {
        let canonical = self.canonicalize(value)?;
        Ok(hash_with_domain(domain_tags::CONTENT, &canonical))
    }

    /// Sort JSON keys alphabetically (recursive)
    fn sort_json_keys(value: &serde_json::Value) -> serde_json::Value {
        match value {
            serde_json::Value::Object(map) => {
                let mut keys: Vec<_> = map.keys().collect();
                keys.sort();
                let mut sorted = serde_json::Map::new();
                for key in keys {
                    if let Some(v) = map.get(key) {
                        sorted.insert(key.clone(), Self::sort_json_keys(v));
                    }
                }
                serde_json::Value::Object(sorted)
            }
            serde_json::Value::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(Self::sort_json_keys).collect())
            }
            _ => value.clone(),
        }
    }
}
