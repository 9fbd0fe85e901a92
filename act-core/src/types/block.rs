//! Sealed blocks

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::common::{Digest, WitnessId};
use super::entry::Entry;
use crate::canon::{domain_tags, hash_with_domain};
use crate::crypto::MerkleTree;

/// A sealed batch of finalized entries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub height: u64,
    pub timestamp: DateTime<Utc>,
    /// Finalized entries in acceptance order
    pub entries: Vec<Entry>,
    pub prev_block_hash: Digest,
    /// Root over the entries' content hashes
    pub merkle_root: Digest,
    /// One signature per distinct accepting witness across the batch
    pub consensus_signatures: BTreeMap<WitnessId, Digest>,
    pub total_atp_cost: u64,
}

impl Block {
    /// Hash of this block: domain-tagged `height:merkle_root:prev_block_hash`
    pub fn block_hash(&self) -> Digest {
        compute_block_hash(self.height, &self.merkle_root, &self.prev_block_hash)
    }

    /// Recompute the Merkle root from the member entries
    pub fn recompute_merkle_root(&self) -> Digest {
        let leaves: Vec<Digest> = self.entries.iter().map(|e| e.content_hash).collect();
        MerkleTree::build(&leaves).root()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

/// Block hash over its header fields
pub fn compute_block_hash(height: u64, merkle_root: &Digest, prev_block_hash: &Digest) -> Digest {
    let header = format!("{}:{}:{}", height, merkle_root, prev_block_hash);
    hash_with_domain(domain_tags::BLOCK, header.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_hash_covers_header() {
        let root = Digest::sha256(b"root");
        let prev = Digest::sha256(b"prev");
        let h = compute_block_hash(0, &root, &prev);

        assert_ne!(h, compute_block_hash(1, &root, &prev));
        assert_ne!(h, compute_block_hash(0, &prev, &root));
        assert_eq!(h, compute_block_hash(0, &root, &prev));
    }
}
