//! Merkle tree implementation for the ACT chain
//!
//! Binary Merkle tree over entry content hashes, used to seal blocks and
//! hand out inclusion proofs. Nodes are kept in a flat, level-ordered array
//! (leaves first, root last), so a tree is plain data and proofs are
//! computed by index arithmetic.

use crate::canon::{domain_tags, hash_with_domain};
use crate::types::Digest;
use serde::{Deserialize, Serialize};

/// Root of a tree built from no leaves
pub fn empty_root() -> Digest {
    hash_with_domain(domain_tags::MERKLE, b"empty")
}

/// Merkle tree for block sealing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleTree {
    /// Level order: padded leaves first, then each parent level up to the root
    nodes: Vec<Digest>,
    /// Number of leaves before padding
    leaf_count: usize,
}

impl MerkleTree {
    /// Build a Merkle tree from leaf digests
    ///
    /// If the number of leaves is not a power of 2, the last leaf is duplicated
    /// until it is.
    pub fn build(leaves: &[Digest]) -> Self {
        let Some(last) = leaves.last().copied() else {
            return Self {
                nodes: vec![empty_root()],
                leaf_count: 0,
            };
        };

        let n = leaves.len().next_power_of_two();
        let mut nodes = Vec::with_capacity(2 * n - 1);
        nodes.extend_from_slice(leaves);
        nodes.resize(n, last);

        let mut level_start = 0;
        let mut level_size = n;
        while level_size > 1 {
            for i in 0..level_size / 2 {
                let left = nodes[level_start + 2 * i];
                let right = nodes[level_start + 2 * i + 1];
                nodes.push(Digest::combine(&left, &right));
            }
            level_start += level_size;
            level_size /= 2;
        }

        Self {
            nodes,
            leaf_count: leaves.len(),
        }
    }

    /// Root hash of the tree
    pub fn root(&self) -> Digest {
        self.nodes.last().copied().unwrap_or_else(empty_root)
    }

    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// Position of the first leaf equal to `leaf`
    pub fn position(&self, leaf: &Digest) -> Option<usize> {
        self.nodes[..self.leaf_count].iter().position(|d| d == leaf)
    }

    /// Proof for a leaf value; duplicates resolve to the first position
    pub fn prove(&self, leaf: &Digest) -> Option<MerkleProof> {
        self.prove_index(self.position(leaf)?)
    }

    /// Proof for the leaf at `leaf_index`
    pub fn prove_index(&self, leaf_index: usize) -> Option<MerkleProof> {
        if leaf_index >= self.leaf_count {
            return None;
        }

        let mut path = Vec::new();
        let mut idx = leaf_index;
        let mut level_start = 0;
        let mut level_size = self.leaf_count.next_power_of_two();

        while level_size > 1 {
            let (sibling_idx, side) = if idx % 2 == 0 {
                (idx + 1, Side::Right)
            } else {
                (idx - 1, Side::Left)
            };
            path.push(ProofStep {
                sibling: self.nodes[level_start + sibling_idx],
                side,
            });
            idx /= 2;
            level_start += level_size;
            level_size /= 2;
        }

        Some(MerkleProof {
            leaf_index,
            leaf_hash: self.nodes[leaf_index],
            path,
            root: self.root(),
        })
    }
}

/// Which side of the running hash a sibling sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

/// One level of a proof path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    pub sibling: Digest,
    pub side: Side,
}

/// Inclusion proof for one leaf
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub leaf_index: usize,
    pub leaf_hash: Digest,
    /// Siblings from the leaf level upward
    pub path: Vec<ProofStep>,
    /// Root the proof was issued against
    pub root: Digest,
}

impl MerkleProof {
    /// Fold the path into the leaf
    pub fn compute_root(&self) -> Digest {
        self.path.iter().fold(self.leaf_hash, |current, step| match step.side {
            Side::Right => Digest::combine(&current, &step.sibling),
            Side::Left => Digest::combine(&step.sibling, &current),
        })
    }

    /// Verify against the stored root
    pub fn verify(&self) -> bool {
        self.compute_root() == self.root
    }

    /// Verify against an externally supplied root
    pub fn verify_against(&self, root: &Digest) -> bool {
        &self.root == root && self.verify()
    }
}
