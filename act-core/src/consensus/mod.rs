//! Consensus Engine
//!
//! Owns the proposal, vote, accept and seal lifecycle of the ACT chain:
//!
//! ```text
//! propose -> Proposed -> (votes) -> Voting -> finalize_entry -> Accepted
//!                                      \                          |
//!                                       -> reject_entry        seal_block
//!                                           Rejected              v
//!                                                             Finalized
//! ```
//!
//! Two hash chains are kept: every proposal links to the content hash of the
//! previous proposal, and every block links to the hash of the previous
//! block (genesis constant for height 0).

mod engine;

pub use engine::ConsensusEngine;

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};
use crate::types::{ConsensusState, Digest, EntryId};

/// How `resolve_fork` breaks a tie on accept votes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForkTieBreak {
    /// Oldest proposal wins
    EarliestTimestamp,
    /// Lexicographically smallest entry id wins
    LowestEntryId,
    /// Ties are reported as a conflict for an operator to settle
    #[default]
    Manual,
}

impl ForkTieBreak {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "earliest_timestamp" | "timestamp" => Some(Self::EarliestTimestamp),
            "lowest_entry_id" | "entry_id" => Some(Self::LowestEntryId),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

/// Why an entry failed verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationFailure {
    EntryNotFound,
    NotFinalized,
    MerkleInvalid,
    InsufficientWitnesses,
}

/// Result of `verify_entry`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryVerification {
    pub entry_id: EntryId,
    pub verified: bool,
    pub reason: Option<VerificationFailure>,
    pub state: Option<ConsensusState>,
    pub block_height: Option<u64>,
    /// Proof recomputes to the sealing block's root and its leaf is the content hash
    pub merkle_valid: bool,
    /// Stored content re-hashes to the stored content hash
    pub content_hash_valid: bool,
    pub witnesses: usize,
    pub required_witnesses: usize,
    pub content_hash: Option<Digest>,
}

impl EntryVerification {
    pub(crate) fn failed(entry_id: &EntryId, reason: VerificationFailure) -> Self {
        Self {
            entry_id: entry_id.clone(),
            verified: false,
            reason: Some(reason),
            state: None,
            block_height: None,
            merkle_valid: false,
            content_hash_valid: false,
            witnesses: 0,
            required_witnesses: 0,
            content_hash: None,
        }
    }
}

/// Result of `get_chain_proof`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainProof {
    /// Every block's prev hash matches its predecessor's hash
    pub valid: bool,
    pub blocks: usize,
    pub entries: usize,
    pub latest_hash: Digest,
    pub total_atp_cost: u64,
    /// Height of the first block whose prev hash does not match
    pub broken_at: Option<u64>,
    /// Every block's Merkle root matches its member entries
    pub merkle_roots_valid: bool,
}

impl ChainProof {
    /// Turn a failed proof into [`LedgerError::IntegrityViolation`]
    pub fn ensure_valid(&self) -> LedgerResult<()> {
        if let Some(height) = self.broken_at {
            return Err(LedgerError::IntegrityViolation(format!(
                "block hash chain broken at height {}",
                height
            )));
        }
        if !self.valid {
            return Err(LedgerError::IntegrityViolation(
                "block hash chain is broken".into(),
            ));
        }
        if !self.merkle_roots_valid {
            return Err(LedgerError::IntegrityViolation(
                "block merkle root does not match its entries".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proof() -> ChainProof {
        ChainProof {
            valid: true,
            blocks: 3,
            entries: 6,
            latest_hash: Digest::sha256(b"head"),
            total_atp_cost: 0,
            broken_at: None,
            merkle_roots_valid: true,
        }
    }

    #[test]
    fn test_ensure_valid() {
        assert!(proof().ensure_valid().is_ok());

        let broken = ChainProof {
            valid: false,
            broken_at: Some(2),
            ..proof()
        };
        let err = broken.ensure_valid().unwrap_err();
        assert!(err.is_integrity());
        assert!(err.to_string().contains("height 2"));

        let bad_root = ChainProof {
            merkle_roots_valid: false,
            ..proof()
        };
        assert!(matches!(
            bad_root.ensure_valid(),
            Err(LedgerError::IntegrityViolation(_))
        ));
    }
}
