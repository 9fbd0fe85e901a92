//! Entry types for the ACT chain
//!
//! An entry is the unit that moves through the fractal tiers and, once it
//! reaches Root, through the consensus lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::common::{Digest, EntryId, WitnessId};
use super::content::EntryContent;
use crate::constants;
use crate::crypto::MerkleProof;

/// Fractal chain hierarchy, ephemeral to permanent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainLevel {
    /// Bounded ring buffer, no ATP cost
    Compost,
    /// SNARC-gated durable list
    Leaf,
    /// Multi-witness durable list
    Stem,
    /// Consensus-anchored
    Root,
}

impl ChainLevel {
    /// ATP cost charged for an entry at this level
    pub fn atp_cost(&self) -> u64 {
        match self {
            Self::Compost => constants::ATP_COST_COMPOST,
            Self::Leaf => constants::ATP_COST_LEAF,
            Self::Stem => constants::ATP_COST_STEM,
            Self::Root => constants::ATP_COST_ROOT,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compost => "compost",
            Self::Leaf => "leaf",
            Self::Stem => "stem",
            Self::Root => "root",
        }
    }
}

impl fmt::Display for ChainLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Types of entries that can be anchored on-chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    BilateralSettlement,
    AdpDischarge,
    ConservationProof,
    LctRegistration,
    CharterAmendment,
    CredentialIssuance,
    AuditSeal,
    TransferCommit,
    TransferComplete,
    DoubleSpendAlert,
}

impl EntryType {
    /// Every entry type, in declaration order
    pub const ALL: [EntryType; 10] = [
        Self::BilateralSettlement,
        Self::AdpDischarge,
        Self::ConservationProof,
        Self::LctRegistration,
        Self::CharterAmendment,
        Self::CredentialIssuance,
        Self::AuditSeal,
        Self::TransferCommit,
        Self::TransferComplete,
        Self::DoubleSpendAlert,
    ];

    /// Accept votes an entry of this type needs before it can be accepted
    pub fn required_witnesses(&self) -> usize {
        match self {
            Self::BilateralSettlement => 3,
            Self::AdpDischarge => 2,
            Self::ConservationProof => 3,
            Self::LctRegistration => 3,
            Self::CharterAmendment => 5,
            Self::CredentialIssuance => 2,
            Self::AuditSeal => 3,
            Self::TransferCommit => 2,
            Self::TransferComplete => 2,
            Self::DoubleSpendAlert => 1,
        }
    }

    /// Types with downstream effects (SNARC consequential factor)
    pub fn is_consequential(&self) -> bool {
        matches!(
            self,
            Self::BilateralSettlement
                | Self::DoubleSpendAlert
                | Self::ConservationProof
                | Self::CharterAmendment
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BilateralSettlement => "bilateral_settlement",
            Self::AdpDischarge => "adp_discharge",
            Self::ConservationProof => "conservation_proof",
            Self::LctRegistration => "lct_registration",
            Self::CharterAmendment => "charter_amendment",
            Self::CredentialIssuance => "credential_issuance",
            Self::AuditSeal => "audit_seal",
            Self::TransferCommit => "transfer_commit",
            Self::TransferComplete => "transfer_complete",
            Self::DoubleSpendAlert => "double_spend_alert",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// State of a proposed entry in consensus
///
/// `Proposed -> Voting -> Accepted -> Finalized`, with `Rejected` as a
/// separate terminal state. Accepted means the vote thresholds are met;
/// Finalized means the entry was sealed into a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusState {
    Proposed,
    Voting,
    Accepted,
    Finalized,
    Rejected,
}

impl ConsensusState {
    fn rank(&self) -> u8 {
        match self {
            Self::Proposed => 0,
            Self::Voting => 1,
            Self::Accepted => 2,
            Self::Finalized => 3,
            Self::Rejected => 3,
        }
    }

    /// Check if no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalized | Self::Rejected)
    }

    /// Check if a transition to `next` moves strictly forward
    pub fn can_advance_to(&self, next: ConsensusState) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            Self::Rejected => matches!(self, Self::Proposed | Self::Voting),
            Self::Finalized => matches!(self, Self::Accepted),
            _ => next.rank() > self.rank(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proposed => "proposed",
            Self::Voting => "voting",
            Self::Accepted => "accepted",
            Self::Finalized => "finalized",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ConsensusState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A witness's vote on a proposed entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WitnessVote {
    pub witness_id: WitnessId,
    pub entry_id: EntryId,
    /// true = accept, false = reject
    pub accept: bool,
    /// Placeholder signature (digest of witness, entry, vote and timestamp)
    pub signature: Digest,
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// An entry on the ACT chain or in one of the fractal tiers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub entry_id: EntryId,
    pub entry_type: EntryType,
    pub chain_level: ChainLevel,
    pub timestamp: DateTime<Utc>,
    /// Link to the previous proposal's content hash (or a tier-local placeholder)
    pub prev_hash: Digest,
    pub content: EntryContent,
    pub content_hash: Digest,
    pub votes: Vec<WitnessVote>,
    pub merkle_proof: Option<MerkleProof>,
    pub block_height: Option<u64>,
    pub consensus_state: ConsensusState,
    pub atp_cost: u64,
}

impl Entry {
    /// Number of accept votes
    pub fn accept_votes(&self) -> usize {
        self.votes.iter().filter(|v| v.accept).count()
    }

    /// Number of reject votes
    pub fn reject_votes(&self) -> usize {
        self.votes.iter().filter(|v| !v.accept).count()
    }

    /// Check whether a witness already voted on this entry
    pub fn has_vote_from(&self, witness_id: &WitnessId) -> bool {
        self.votes.iter().any(|v| &v.witness_id == witness_id)
    }

    /// Accept votes this entry's type requires
    pub fn required_witnesses(&self) -> usize {
        self.entry_type.required_witnesses()
    }

    /// Move to `next` if the transition is forward; returns whether it moved
    pub fn advance_state(&mut self, next: ConsensusState) -> bool {
        if self.consensus_state.can_advance_to(next) {
            self.consensus_state = next;
            true
        } else {
            false
        }
    }
}
