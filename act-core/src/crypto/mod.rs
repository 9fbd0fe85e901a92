//! Cryptographic primitives for the ACT chain
//!
//! - Merkle trees for block sealing and inclusion proofs

pub mod merkle;

pub use merkle::{empty_root, MerkleProof, MerkleTree, ProofStep, Side};
