//! Consensus engine implementation

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, warn};

use super::{ChainProof, EntryVerification, ForkTieBreak, VerificationFailure};
use crate::canon::{vote_signature, Canonicalizer};
use crate::config::LedgerConfig;
use crate::constants::{CONSENSUS_ENTRY_PREFIX, GENESIS_SEED};
use crate::crypto::MerkleTree;
use crate::error::{ConfigError, LedgerError, LedgerResult};
use crate::logging::operations;
use crate::types::{
    short_id, Block, ChainLevel, ConsensusState, Digest, Entry, EntryContent, EntryId, EntryType,
    WitnessId, WitnessVote,
};

/// Single mutation authority for one ACT chain
#[derive(Debug, Clone)]
pub struct ConsensusEngine {
    /// Consensus nodes in configured order
    nodes: Vec<WitnessId>,
    node_set: HashSet<WitnessId>,
    /// Required accept ratio over all nodes
    threshold: f64,
    fork_tie_break: ForkTieBreak,
    canon: Canonicalizer,
    genesis: Digest,
    blocks: Vec<Block>,
    /// Entry index, every entry ever proposed
    entries: HashMap<EntryId, Entry>,
    /// Not yet finalized or rejected, in proposal order
    pending: Vec<EntryId>,
    /// Accepted but not yet sealed, in acceptance order
    accepted_order: Vec<EntryId>,
    settled_transfers: HashSet<String>,
    /// Content hash of the most recent proposal
    latest_entry_hash: Digest,
}

impl ConsensusEngine {
    /// Create an engine over a fixed node set
    pub fn new<I, S>(nodes: I, threshold: f64) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let nodes: Vec<WitnessId> = nodes.into_iter().map(WitnessId::new).collect();
        if nodes.is_empty() {
            return Err(ConfigError::NoConsensusNodes);
        }
        let mut node_set = HashSet::with_capacity(nodes.len());
        for node in &nodes {
            if !node_set.insert(node.clone()) {
                return Err(ConfigError::DuplicateNode(node.to_string()));
            }
        }
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(ConfigError::InvalidThreshold(threshold));
        }

        let genesis = Digest::sha256(GENESIS_SEED.as_bytes());
        Ok(Self {
            nodes,
            node_set,
            threshold,
            fork_tie_break: ForkTieBreak::default(),
            canon: Canonicalizer::new(),
            genesis,
            blocks: Vec::new(),
            entries: HashMap::new(),
            pending: Vec::new(),
            accepted_order: Vec::new(),
            settled_transfers: HashSet::new(),
            latest_entry_hash: genesis,
        })
    }

    pub fn from_config(config: &LedgerConfig) -> Result<Self, ConfigError> {
        Ok(
            Self::new(config.consensus_nodes.iter().cloned(), config.consensus_threshold)?
                .with_fork_tie_break(config.fork_tie_break),
        )
    }

    pub fn with_fork_tie_break(mut self, policy: ForkTieBreak) -> Self {
        self.fork_tie_break = policy;
        self
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Propose an entry for consensus
    ///
    /// Links the entry to the previous proposal's content hash and charges
    /// the ATP cost of `chain_level`.
    pub fn propose(
        &mut self,
        entry_type: EntryType,
        content: EntryContent,
        chain_level: ChainLevel,
    ) -> LedgerResult<Entry> {
        if content.entry_type() != entry_type {
            return Err(LedgerError::Validation(format!(
                "content is {} but entry type is {}",
                content.entry_type(),
                entry_type
            )));
        }
        content.validate()?;

        let content_hash = self.canon.content_hash(&content)?;
        let entry_id = EntryId::new(format!(
            "{}:{}:{}",
            CONSENSUS_ENTRY_PREFIX,
            entry_type,
            short_id()
        ));
        let entry = Entry {
            entry_id: entry_id.clone(),
            entry_type,
            chain_level,
            timestamp: Utc::now(),
            prev_hash: self.latest_entry_hash,
            content,
            content_hash,
            votes: Vec::new(),
            merkle_proof: None,
            block_height: None,
            consensus_state: ConsensusState::Proposed,
            atp_cost: chain_level.atp_cost(),
        };

        self.latest_entry_hash = content_hash;
        self.pending.push(entry_id.clone());
        self.entries.insert(entry_id, entry.clone());

        info!(
            entry_id = %entry.entry_id,
            entry_type = %entry_type,
            chain_level = %chain_level,
            operation = operations::PROPOSE,
            "Entry proposed"
        );
        Ok(entry)
    }

    /// Record a witness vote
    ///
    /// Votes are checked in order: unknown entry, unknown witness, repeat
    /// vote, then a terminal entry.
    pub fn submit_vote(
        &mut self,
        entry_id: &EntryId,
        witness_id: &WitnessId,
        accept: bool,
        reason: Option<String>,
    ) -> LedgerResult<WitnessVote> {
        let entry = self
            .entries
            .get_mut(entry_id)
            .ok_or_else(|| LedgerError::NotFound(format!("entry {}", entry_id)))?;

        if !self.node_set.contains(witness_id) {
            warn!(
                entry_id = %entry_id,
                witness_id = %witness_id,
                operation = operations::VOTE,
                "Vote from non-consensus node rejected"
            );
            return Err(LedgerError::Unauthorized(witness_id.to_string()));
        }

        if entry.has_vote_from(witness_id) {
            return Err(LedgerError::DuplicateVote {
                entry_id: entry_id.to_string(),
                witness_id: witness_id.to_string(),
            });
        }

        if entry.consensus_state.is_terminal() {
            return Err(LedgerError::InvalidState(format!(
                "entry {} is {} and takes no more votes",
                entry_id, entry.consensus_state
            )));
        }

        let timestamp = Utc::now();
        let vote = WitnessVote {
            witness_id: witness_id.clone(),
            entry_id: entry_id.clone(),
            accept,
            signature: vote_signature(witness_id, entry_id, accept, &timestamp),
            reason,
            timestamp,
        };
        entry.votes.push(vote.clone());
        entry.advance_state(ConsensusState::Voting);

        debug!(
            entry_id = %entry_id,
            witness_id = %witness_id,
            accept,
            accept_votes = entry.accept_votes(),
            operation = operations::VOTE,
            "Vote recorded"
        );
        Ok(vote)
    }

    /// `(has_consensus, accept_ratio)`; unknown entries report `(false, 0.0)`
    pub fn check_consensus(&self, entry_id: &EntryId) -> (bool, f64) {
        match self.entries.get(entry_id) {
            Some(entry) => self.consensus_for(entry),
            None => (false, 0.0),
        }
    }

    fn consensus_for(&self, entry: &Entry) -> (bool, f64) {
        let accepts = entry.accept_votes();
        let ratio = accepts as f64 / self.nodes.len() as f64;
        let has_consensus = accepts >= entry.required_witnesses() && ratio >= self.threshold;
        (has_consensus, ratio)
    }

    /// Move an entry to Accepted if consensus holds
    ///
    /// Returns `Ok(false)` while the thresholds are not met. Entries already
    /// Accepted or Finalized return `Ok(true)`.
    pub fn finalize_entry(&mut self, entry_id: &EntryId) -> LedgerResult<bool> {
        let (has_consensus, ratio) = {
            let entry = self
                .entries
                .get(entry_id)
                .ok_or_else(|| LedgerError::NotFound(format!("entry {}", entry_id)))?;
            match entry.consensus_state {
                ConsensusState::Accepted | ConsensusState::Finalized => return Ok(true),
                ConsensusState::Rejected => {
                    return Err(LedgerError::InvalidState(format!(
                        "entry {} was rejected",
                        entry_id
                    )))
                }
                ConsensusState::Proposed | ConsensusState::Voting => {}
            }
            self.consensus_for(entry)
        };

        if !has_consensus {
            debug!(
                entry_id = %entry_id,
                accept_ratio = ratio,
                operation = operations::FINALIZE,
                "Consensus not reached yet"
            );
            return Ok(false);
        }

        if let Some(entry) = self.entries.get_mut(entry_id) {
            entry.advance_state(ConsensusState::Accepted);
        }
        self.accepted_order.push(entry_id.clone());

        info!(
            entry_id = %entry_id,
            accept_ratio = ratio,
            operation = operations::FINALIZE,
            "Entry accepted"
        );
        Ok(true)
    }

    /// Reject an entry that can no longer reach consensus
    ///
    /// Only Proposed or Voting entries qualify, and only once the accept
    /// votes plus the nodes that have not voted fall short of either
    /// threshold.
    pub fn reject_entry(&mut self, entry_id: &EntryId) -> LedgerResult<()> {
        let entry = self
            .entries
            .get(entry_id)
            .ok_or_else(|| LedgerError::NotFound(format!("entry {}", entry_id)))?;

        if !matches!(
            entry.consensus_state,
            ConsensusState::Proposed | ConsensusState::Voting
        ) {
            return Err(LedgerError::InvalidState(format!(
                "entry {} is {} and cannot be rejected",
                entry_id, entry.consensus_state
            )));
        }

        let outstanding = self.nodes.len().saturating_sub(entry.votes.len());
        let best_case = entry.accept_votes() + outstanding;
        let best_ratio = best_case as f64 / self.nodes.len() as f64;
        if best_case >= entry.required_witnesses() && best_ratio >= self.threshold {
            return Err(LedgerError::InvalidState(format!(
                "entry {} can still reach consensus",
                entry_id
            )));
        }

        if let Some(entry) = self.entries.get_mut(entry_id) {
            entry.advance_state(ConsensusState::Rejected);
        }
        self.pending.retain(|id| id != entry_id);

        info!(
            entry_id = %entry_id,
            operation = operations::REJECT,
            "Entry rejected"
        );
        Ok(())
    }

    /// Seal every Accepted entry into the next block
    ///
    /// Returns `None` when nothing is Accepted.
    pub fn seal_block(&mut self) -> Option<Block> {
        let accepted: Vec<EntryId> = std::mem::take(&mut self.accepted_order)
            .into_iter()
            .filter(|id| {
                self.entries
                    .get(id)
                    .is_some_and(|e| e.consensus_state == ConsensusState::Accepted)
            })
            .collect();
        if accepted.is_empty() {
            return None;
        }

        let leaves: Vec<Digest> = accepted
            .iter()
            .filter_map(|id| self.entries.get(id))
            .map(|e| e.content_hash)
            .collect();
        let tree = MerkleTree::build(&leaves);
        let height = self.chain_height();
        let prev_block_hash = self.latest_block_hash();

        let mut signatures = BTreeMap::new();
        let mut members = Vec::with_capacity(accepted.len());
        for (index, id) in accepted.iter().enumerate() {
            let Some(member) = self.entries.get_mut(id) else {
                continue;
            };
            for vote in member.votes.iter().filter(|v| v.accept) {
                signatures
                    .entry(vote.witness_id.clone())
                    .or_insert(vote.signature);
            }
            member.merkle_proof = tree.prove_index(index);
            member.block_height = Some(height);
            member.advance_state(ConsensusState::Finalized);
            members.push(member.clone());
        }

        let sealed: HashSet<&EntryId> = accepted.iter().collect();
        self.pending.retain(|id| !sealed.contains(id));

        let block = Block {
            height,
            timestamp: Utc::now(),
            total_atp_cost: members.iter().map(|e| e.atp_cost).sum(),
            entries: members,
            prev_block_hash,
            merkle_root: tree.root(),
            consensus_signatures: signatures,
        };

        info!(
            block_height = height,
            count = block.entries.len(),
            signers = block.consensus_signatures.len(),
            merkle_root = %block.merkle_root,
            operation = operations::SEAL_BLOCK,
            "Block sealed"
        );
        self.blocks.push(block.clone());
        Some(block)
    }

    // ------------------------------------------------------------------
    // Verification
    // ------------------------------------------------------------------

    /// Verify a finalized entry against its sealing block
    pub fn verify_entry(&self, entry_id: &EntryId) -> EntryVerification {
        let Some(entry) = self.entries.get(entry_id) else {
            return EntryVerification::failed(entry_id, VerificationFailure::EntryNotFound);
        };

        let witnesses = entry.accept_votes();
        let required_witnesses = entry.required_witnesses();
        let content_hash_valid = self
            .canon
            .content_hash(&entry.content)
            .map(|h| h == entry.content_hash)
            .unwrap_or(false);

        let mut report = EntryVerification {
            entry_id: entry_id.clone(),
            verified: false,
            reason: None,
            state: Some(entry.consensus_state),
            block_height: entry.block_height,
            merkle_valid: false,
            content_hash_valid,
            witnesses,
            required_witnesses,
            content_hash: Some(entry.content_hash),
        };

        if entry.consensus_state != ConsensusState::Finalized {
            report.reason = Some(VerificationFailure::NotFinalized);
            return report;
        }

        let block_root = entry
            .block_height
            .and_then(|h| self.block(h))
            .map(|b| b.merkle_root);
        report.merkle_valid = match (&entry.merkle_proof, block_root) {
            (Some(proof), Some(root)) => {
                proof.leaf_hash == entry.content_hash && proof.verify_against(&root)
            }
            _ => false,
        };

        report.reason = if !report.merkle_valid {
            Some(VerificationFailure::MerkleInvalid)
        } else if witnesses < required_witnesses {
            Some(VerificationFailure::InsufficientWitnesses)
        } else {
            None
        };
        report.verified = report.reason.is_none();

        if !report.merkle_valid || !content_hash_valid {
            warn!(
                entry_id = %entry_id,
                merkle_valid = report.merkle_valid,
                content_hash_valid,
                operation = operations::VERIFY_ENTRY,
                "Entry failed integrity check"
            );
        }
        report
    }

    /// Walk the block chain from genesis
    pub fn get_chain_proof(&self) -> ChainProof {
        let mut expected_prev = self.genesis;
        let mut broken_at = None;
        for (height, block) in self.blocks.iter().enumerate() {
            if broken_at.is_none() && block.prev_block_hash != expected_prev {
                broken_at = Some(height as u64);
            }
            expected_prev = block.block_hash();
        }
        let merkle_roots_valid = self
            .blocks
            .iter()
            .all(|b| b.recompute_merkle_root() == b.merkle_root);

        if broken_at.is_some() || !merkle_roots_valid {
            warn!(
                broken_at = ?broken_at,
                merkle_roots_valid,
                operation = operations::CHAIN_PROOF,
                "Chain integrity violation"
            );
        }

        ChainProof {
            valid: broken_at.is_none(),
            blocks: self.blocks.len(),
            entries: self.blocks.iter().map(Block::entry_count).sum(),
            latest_hash: self.latest_block_hash(),
            total_atp_cost: self.blocks.iter().map(|b| b.total_atp_cost).sum(),
            broken_at,
            merkle_roots_valid,
        }
    }

    // ------------------------------------------------------------------
    // Double-spend and forks
    // ------------------------------------------------------------------

    /// Check if a transfer was already settled
    pub fn detect_double_spend(&self, transfer_id: &str) -> bool {
        self.settled_transfers.contains(transfer_id)
    }

    /// Mark a transfer settled; idempotent
    pub fn record_settlement(&mut self, transfer_id: impl Into<String>) {
        self.settled_transfers.insert(transfer_id.into());
    }

    pub fn settled_transfer_count(&self) -> usize {
        self.settled_transfers.len()
    }

    /// Pick the fork candidate with the most accept votes
    ///
    /// Ties are broken per the configured [`ForkTieBreak`].
    pub fn resolve_fork<'a>(&self, candidates: &'a [Entry]) -> LedgerResult<&'a Entry> {
        let best = candidates
            .iter()
            .map(Entry::accept_votes)
            .max()
            .ok_or_else(|| LedgerError::Validation("no fork candidates to resolve".into()))?;
        let leaders: Vec<&'a Entry> = candidates
            .iter()
            .filter(|e| e.accept_votes() == best)
            .collect();

        let winner = match self.fork_tie_break {
            _ if leaders.len() == 1 => leaders.first().copied(),
            ForkTieBreak::EarliestTimestamp => leaders.iter().copied().min_by(|a, b| {
                a.timestamp
                    .cmp(&b.timestamp)
                    .then_with(|| a.entry_id.cmp(&b.entry_id))
            }),
            ForkTieBreak::LowestEntryId => leaders.iter().copied().min_by(|a, b| a.entry_id.cmp(&b.entry_id)),
            ForkTieBreak::Manual => {
                let ids: Vec<String> = leaders.iter().map(|e| e.entry_id.to_string()).collect();
                warn!(
                    count = ids.len(),
                    accept_votes = best,
                    operation = operations::RESOLVE_FORK,
                    "Fork tie needs manual resolution"
                );
                return Err(LedgerError::ForkTie(ids));
            }
        };

        let winner =
            winner.ok_or_else(|| LedgerError::Validation("no fork candidates to resolve".into()))?;
        info!(
            entry_id = %winner.entry_id,
            accept_votes = best,
            operation = operations::RESOLVE_FORK,
            "Fork resolved"
        );
        Ok(winner)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn nodes(&self) -> &[WitnessId] {
        &self.nodes
    }

    pub fn is_consensus_node(&self, witness_id: &WitnessId) -> bool {
        self.node_set.contains(witness_id)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn fork_tie_break(&self) -> ForkTieBreak {
        self.fork_tie_break
    }

    pub fn genesis_hash(&self) -> Digest {
        self.genesis
    }

    /// Number of sealed blocks (height of the next block)
    pub fn chain_height(&self) -> u64 {
        self.blocks.len() as u64
    }

    /// Hash of the last block, or genesis
    pub fn latest_block_hash(&self) -> Digest {
        self.blocks
            .last()
            .map(Block::block_hash)
            .unwrap_or(self.genesis)
    }

    /// Content hash of the last proposal, or genesis
    pub fn latest_entry_hash(&self) -> Digest {
        self.latest_entry_hash
    }

    pub fn get_entry(&self, entry_id: &EntryId) -> Option<&Entry> {
        self.entries.get(entry_id)
    }

    /// Entries not yet finalized or rejected, in proposal order
    pub fn pending_entries(&self) -> Vec<&Entry> {
        self.pending
            .iter()
            .filter_map(|id| self.entries.get(id))
            .collect()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, height: u64) -> Option<&Block> {
        usize::try_from(height)
            .ok()
            .and_then(|h| self.blocks.get(h))
            .filter(|b| b.height == height)
    }

    /// Sealed entries, optionally filtered by type and minimum timestamp
    pub fn query_entries(
        &self,
        entry_type: Option<EntryType>,
        since: Option<DateTime<Utc>>,
    ) -> Vec<&Entry> {
        self.blocks
            .iter()
            .flat_map(|b| b.entries.iter())
            .filter(|e| entry_type.map_or(true, |t| e.entry_type == t))
            .filter(|e| since.map_or(true, |s| e.timestamp >= s))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BilateralStatement, ContentPayload};
    use rust_decimal::Decimal;

    const NODES: [&str; 5] = [
        "node-alpha",
        "node-beta",
        "node-gamma",
        "node-delta",
        "node-epsilon",
    ];

    fn engine(threshold: f64) -> ConsensusEngine {
        ConsensusEngine::new(NODES, threshold).unwrap()
    }

    fn w(i: usize) -> WitnessId {
        WitnessId::new(NODES[i])
    }

    fn settlement() -> EntryContent {
        let statement = BilateralStatement::new("soc:alpha", "soc:beta")
            .unwrap()
            .with_balances(Decimal::new(900, 0), Decimal::new(1100, 0))
            .with_net_position(Decimal::new(100, 0));
        EntryContent::new(ContentPayload::BilateralSettlement(statement)).unwrap()
    }

    fn audit(scope: &str) -> EntryContent {
        EntryContent::new(ContentPayload::AuditSeal {
            scope: scope.into(),
            sealed_digest: "d1".into(),
            entity_id: None,
        })
        .unwrap()
    }

    fn accept_all(engine: &mut ConsensusEngine, id: &EntryId, n: usize) {
        for i in 0..n {
            engine.submit_vote(id, &w(i), true, None).unwrap();
        }
    }

    fn sealed(engine: &mut ConsensusEngine, content: EntryContent) -> Entry {
        let e = engine
            .propose(content.entry_type(), content, ChainLevel::Root)
            .unwrap();
        accept_all(engine, &e.entry_id, 5);
        assert!(engine.finalize_entry(&e.entry_id).unwrap());
        e
    }

    #[test]
    fn test_genesis_state() {
        let e = engine(0.6);
        assert_eq!(e.chain_height(), 0);
        assert_eq!(e.latest_block_hash(), e.genesis_hash());
        assert_eq!(e.genesis_hash(), Digest::sha256(b"act:genesis:web4"));
        assert!(e.get_chain_proof().valid);
    }

    #[test]
    fn test_invalid_construction() {
        assert!(matches!(
            ConsensusEngine::new(Vec::<String>::new(), 0.6),
            Err(ConfigError::NoConsensusNodes)
        ));
        assert!(matches!(
            ConsensusEngine::new(["a", "a"], 0.6),
            Err(ConfigError::DuplicateNode(_))
        ));
        assert!(matches!(
            ConsensusEngine::new(["a"], 0.0),
            Err(ConfigError::InvalidThreshold(_))
        ));
        assert!(ConsensusEngine::new(["a"], 1.0).is_ok());
    }

    #[test]
    fn test_propose_links_previous_content_hash() {
        let mut e = engine(0.6);
        let first = e
            .propose(EntryType::AuditSeal, audit("a"), ChainLevel::Root)
            .unwrap();
        let second = e
            .propose(EntryType::AuditSeal, audit("b"), ChainLevel::Stem)
            .unwrap();

        assert_eq!(first.prev_hash, e.genesis_hash());
        assert_eq!(second.prev_hash, first.content_hash);
        assert_eq!(first.atp_cost, 200);
        assert_eq!(second.atp_cost, 50);
        assert!(first.entry_id.as_str().starts_with("act:audit_seal:"));
        assert_eq!(first.consensus_state, ConsensusState::Proposed);
        assert_eq!(e.pending_entries().len(), 2);
    }

    #[test]
    fn test_propose_type_mismatch() {
        let mut e = engine(0.6);
        let err = e
            .propose(EntryType::AdpDischarge, audit("a"), ChainLevel::Root)
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        assert!(e.pending_entries().is_empty());
    }

    #[test]
    fn test_vote_errors() {
        let mut e = engine(0.6);
        let entry = e
            .propose(EntryType::AuditSeal, audit("a"), ChainLevel::Root)
            .unwrap();

        let unknown = EntryId::new("act:audit_seal:missing");
        assert!(matches!(
            e.submit_vote(&unknown, &w(0), true, None),
            Err(LedgerError::NotFound(_))
        ));
        assert!(matches!(
            e.submit_vote(&entry.entry_id, &WitnessId::new("rogue"), true, None),
            Err(LedgerError::Unauthorized(_))
        ));

        e.submit_vote(&entry.entry_id, &w(0), true, None).unwrap();
        let dup = e.submit_vote(&entry.entry_id, &w(0), false, None).unwrap_err();
        assert!(dup.is_conflict());
        assert_eq!(e.get_entry(&entry.entry_id).unwrap().votes.len(), 1);
        assert_eq!(
            e.get_entry(&entry.entry_id).unwrap().consensus_state,
            ConsensusState::Voting
        );
    }

    #[test]
    fn test_vote_signature_is_placeholder_digest() {
        let mut e = engine(0.6);
        let entry = e
            .propose(EntryType::AuditSeal, audit("a"), ChainLevel::Root)
            .unwrap();
        let vote = e
            .submit_vote(&entry.entry_id, &w(1), true, Some("ok".into()))
            .unwrap();
        assert_eq!(
            vote.signature,
            vote_signature(&w(1), &entry.entry_id, true, &vote.timestamp)
        );
        assert_eq!(vote.reason.as_deref(), Some("ok"));
    }

    #[test]
    fn test_consensus_needs_witnesses_and_ratio() {
        let mut e = engine(0.6);
        let entry = e
            .propose(EntryType::BilateralSettlement, settlement(), ChainLevel::Root)
            .unwrap();
        let id = &entry.entry_id;

        accept_all(&mut e, id, 2);
        let (ok, ratio) = e.check_consensus(id);
        assert!(!ok);
        assert!((ratio - 0.4).abs() < 1e-9);
        assert!(!e.finalize_entry(id).unwrap());

        e.submit_vote(id, &w(2), true, None).unwrap();
        let (ok, ratio) = e.check_consensus(id);
        assert!(ok);
        assert!((ratio - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_reject_votes_do_not_count() {
        let mut e = engine(0.6);
        let entry = e
            .propose(EntryType::BilateralSettlement, settlement(), ChainLevel::Root)
            .unwrap();
        let id = &entry.entry_id;
        accept_all(&mut e, id, 2);
        e.submit_vote(id, &w(2), false, Some("mismatch".into())).unwrap();
        assert!(!e.check_consensus(id).0);
        e.submit_vote(id, &w(3), true, None).unwrap();
        assert!(e.check_consensus(id).0);
    }

    #[test]
    fn test_charter_needs_every_node() {
        let mut e = engine(0.6);
        let content = EntryContent::new(ContentPayload::CharterAmendment {
            society_id: "soc:alpha".into(),
            amendment: "quorum".into(),
            new_value: "4".into(),
        })
        .unwrap();
        let entry = e
            .propose(EntryType::CharterAmendment, content, ChainLevel::Root)
            .unwrap();
        accept_all(&mut e, &entry.entry_id, 4);
        assert!(!e.check_consensus(&entry.entry_id).0);
        e.submit_vote(&entry.entry_id, &w(4), true, None).unwrap();
        assert!(e.check_consensus(&entry.entry_id).0);
    }

    #[test]
    fn test_unknown_entry_consensus() {
        let e = engine(0.6);
        assert_eq!(e.check_consensus(&EntryId::new("nope")), (false, 0.0));
    }

    #[test]
    fn test_finalize_unknown_is_not_found() {
        let mut e = engine(0.6);
        assert!(e
            .finalize_entry(&EntryId::new("nope"))
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_seal_block() {
        let mut e = engine(0.6);
        assert!(e.seal_block().is_none());

        let a = sealed(&mut e, settlement());
        let b = sealed(&mut e, audit("x"));
        let pending = e
            .propose(EntryType::AuditSeal, audit("y"), ChainLevel::Root)
            .unwrap();

        let block = e.seal_block().unwrap();
        assert_eq!(block.height, 0);
        assert_eq!(block.prev_block_hash, e.genesis_hash());
        assert_eq!(block.entries.len(), 2);
        assert_eq!(block.entries[0].entry_id, a.entry_id);
        assert_eq!(block.entries[1].entry_id, b.entry_id);
        assert_eq!(block.consensus_signatures.len(), 5);
        assert_eq!(block.total_atp_cost, 400);
        assert_eq!(
            block.merkle_root,
            MerkleTree::build(&[a.content_hash, b.content_hash]).root()
        );

        let stored = e.get_entry(&a.entry_id).unwrap();
        assert_eq!(stored.consensus_state, ConsensusState::Finalized);
        assert_eq!(stored.block_height, Some(0));
        assert!(stored.merkle_proof.as_ref().unwrap().verify());

        let remaining: Vec<_> = e.pending_entries().iter().map(|x| x.entry_id.clone()).collect();
        assert_eq!(remaining, vec![pending.entry_id]);
        assert_eq!(e.chain_height(), 1);
        assert_eq!(e.latest_block_hash(), block.block_hash());
        assert!(e.seal_block().is_none());
    }

    #[test]
    fn test_signatures_first_per_witness() {
        let mut e = engine(0.6);
        let a = sealed(&mut e, audit("x"));
        sealed(&mut e, audit("y"));
        let block = e.seal_block().unwrap();

        let stored = e.get_entry(&a.entry_id).unwrap();
        for vote in &stored.votes {
            assert_eq!(block.consensus_signatures[&vote.witness_id], vote.signature);
        }
    }

    #[test]
    fn test_second_block_links_first() {
        let mut e = engine(0.6);
        sealed(&mut e, audit("x"));
        let b0 = e.seal_block().unwrap();
        sealed(&mut e, audit("y"));
        let b1 = e.seal_block().unwrap();

        assert_eq!(b1.height, 1);
        assert_eq!(b1.prev_block_hash, b0.block_hash());
        let proof = e.get_chain_proof();
        assert!(proof.valid);
        assert!(proof.merkle_roots_valid);
        assert_eq!(proof.blocks, 2);
        assert_eq!(proof.entries, 2);
        assert_eq!(proof.total_atp_cost, 400);
        assert_eq!(proof.latest_hash, b1.block_hash());
    }

    #[test]
    fn test_verify_entry() {
        let mut e = engine(0.6);
        let entry = e
            .propose(EntryType::BilateralSettlement, settlement(), ChainLevel::Root)
            .unwrap();

        let report = e.verify_entry(&entry.entry_id);
        assert!(!report.verified);
        assert_eq!(report.reason, Some(VerificationFailure::NotFinalized));
        assert!(report.content_hash_valid);

        accept_all(&mut e, &entry.entry_id, 3);
        e.finalize_entry(&entry.entry_id).unwrap();
        let report = e.verify_entry(&entry.entry_id);
        assert_eq!(report.reason, Some(VerificationFailure::NotFinalized));
        assert_eq!(report.state, Some(ConsensusState::Accepted));

        e.seal_block().unwrap();
        let report = e.verify_entry(&entry.entry_id);
        assert!(report.verified);
        assert!(report.merkle_valid);
        assert_eq!(report.block_height, Some(0));
        assert_eq!(report.witnesses, 3);
        assert_eq!(report.required_witnesses, 3);

        let missing = e.verify_entry(&EntryId::new("nope"));
        assert_eq!(missing.reason, Some(VerificationFailure::EntryNotFound));
    }

    #[test]
    fn test_tampered_proof_fails_verification() {
        let mut e = engine(0.6);
        let entry = sealed(&mut e, audit("x"));
        sealed(&mut e, audit("y"));
        e.seal_block().unwrap();

        if let Some(stored) = e.entries.get_mut(&entry.entry_id) {
            if let Some(proof) = stored.merkle_proof.as_mut() {
                proof.path[0].sibling = Digest::sha256(b"forged");
            }
        }
        let report = e.verify_entry(&entry.entry_id);
        assert!(!report.verified);
        assert!(!report.merkle_valid);
        assert_eq!(report.reason, Some(VerificationFailure::MerkleInvalid));
    }

    #[test]
    fn test_tampered_content_reported() {
        let mut e = engine(0.6);
        let entry = sealed(&mut e, audit("x"));
        e.seal_block().unwrap();

        if let Some(stored) = e.entries.get_mut(&entry.entry_id) {
            stored.content = audit("forged");
        }
        let report = e.verify_entry(&entry.entry_id);
        assert!(!report.content_hash_valid);
    }

    #[test]
    fn test_chain_proof_detects_broken_link() {
        let mut e = engine(0.6);
        for scope in ["a", "b", "c"] {
            sealed(&mut e, audit(scope));
            e.seal_block().unwrap();
        }
        assert!(e.get_chain_proof().valid);

        e.blocks[1].prev_block_hash = Digest::sha256(b"forged");
        let proof = e.get_chain_proof();
        assert!(!proof.valid);
        assert_eq!(proof.broken_at, Some(1));
    }

    #[test]
    fn test_chain_proof_detects_rewritten_root() {
        let mut e = engine(0.6);
        for scope in ["a", "b"] {
            sealed(&mut e, audit(scope));
            e.seal_block().unwrap();
        }
        e.blocks[0].merkle_root = Digest::sha256(b"forged");
        let proof = e.get_chain_proof();
        assert!(!proof.merkle_roots_valid);
        // the block hash covers the root, so the next link breaks too
        assert!(!proof.valid);
        assert_eq!(proof.broken_at, Some(1));
    }

    #[test]
    fn test_first_block_checked_against_genesis() {
        let mut e = engine(0.6);
        sealed(&mut e, audit("a"));
        e.seal_block().unwrap();
        e.blocks[0].prev_block_hash = Digest::zero();
        assert_eq!(e.get_chain_proof().broken_at, Some(0));
    }

    #[test]
    fn test_double_spend_set() {
        let mut e = engine(0.6);
        assert!(!e.detect_double_spend("t1"));
        e.record_settlement("t1");
        e.record_settlement("t1");
        assert!(e.detect_double_spend("t1"));
        assert_eq!(e.settled_transfer_count(), 1);
    }

    #[test]
    fn test_reject_entry() {
        let mut e = engine(0.6);
        let entry = e
            .propose(EntryType::BilateralSettlement, settlement(), ChainLevel::Root)
            .unwrap();
        let id = &entry.entry_id;

        e.submit_vote(id, &w(0), false, None).unwrap();
        e.submit_vote(id, &w(1), false, None).unwrap();
        // three outstanding nodes could still accept
        assert!(matches!(e.reject_entry(id), Err(LedgerError::InvalidState(_))));

        e.submit_vote(id, &w(2), false, None).unwrap();
        e.reject_entry(id).unwrap();
        assert_eq!(
            e.get_entry(id).unwrap().consensus_state,
            ConsensusState::Rejected
        );
        assert!(e.pending_entries().is_empty());
        assert!(matches!(
            e.submit_vote(id, &w(3), true, None),
            Err(LedgerError::InvalidState(_))
        ));
        assert!(matches!(e.finalize_entry(id), Err(LedgerError::InvalidState(_))));
    }

    #[test]
    fn test_accepted_entry_cannot_be_rejected() {
        let mut e = engine(0.6);
        let entry = sealed(&mut e, audit("x"));
        assert!(matches!(
            e.reject_entry(&entry.entry_id),
            Err(LedgerError::InvalidState(_))
        ));
        assert!(e.finalize_entry(&entry.entry_id).unwrap());
    }

    #[test]
    fn test_resolve_fork_most_votes() {
        let mut e = engine(0.6);
        let a = e
            .propose(EntryType::AuditSeal, audit("a"), ChainLevel::Root)
            .unwrap();
        let b = e
            .propose(EntryType::AuditSeal, audit("b"), ChainLevel::Root)
            .unwrap();
        accept_all(&mut e, &a.entry_id, 2);
        accept_all(&mut e, &b.entry_id, 3);

        let candidates = vec![
            e.get_entry(&a.entry_id).unwrap().clone(),
            e.get_entry(&b.entry_id).unwrap().clone(),
        ];
        let winner = e.resolve_fork(&candidates).unwrap();
        assert_eq!(winner.entry_id, b.entry_id);
        assert!(e.resolve_fork(&[]).is_err());
    }

    #[test]
    fn test_resolve_fork_ties() {
        let mut e = engine(0.6);
        let a = e
            .propose(EntryType::AuditSeal, audit("a"), ChainLevel::Root)
            .unwrap();
        let b = e
            .propose(EntryType::AuditSeal, audit("b"), ChainLevel::Root)
            .unwrap();
        let mut a = a;
        a.timestamp = b.timestamp - chrono::Duration::seconds(1);
        let candidates = vec![b.clone(), a.clone()];

        let err = e.resolve_fork(&candidates).unwrap_err();
        assert!(matches!(err, LedgerError::ForkTie(ref ids) if ids.len() == 2));
        assert!(err.is_conflict());

        let e = e.with_fork_tie_break(ForkTieBreak::EarliestTimestamp);
        assert_eq!(e.resolve_fork(&candidates).unwrap().entry_id, a.entry_id);

        let e = e.with_fork_tie_break(ForkTieBreak::LowestEntryId);
        let lowest = std::cmp::min(&a.entry_id, &b.entry_id);
        assert_eq!(&e.resolve_fork(&candidates).unwrap().entry_id, lowest);
    }

    #[test]
    fn test_query_entries() {
        let mut e = engine(0.6);
        let before = Utc::now();
        sealed(&mut e, settlement());
        sealed(&mut e, audit("x"));
        e.seal_block().unwrap();

        assert_eq!(e.query_entries(None, None).len(), 2);
        assert_eq!(e.query_entries(Some(EntryType::AuditSeal), None).len(), 1);
        assert_eq!(e.query_entries(None, Some(before)).len(), 2);
        let later = Utc::now() + chrono::Duration::seconds(60);
        assert!(e.query_entries(None, Some(later)).is_empty());
    }

    #[test]
    fn test_propose_rejects_unvalidated_content() {
        let mut e = engine(0.6);
        let mut json = serde_json::to_value(audit("x")).unwrap();
        json["payload"]["scope"] = "".into();
        let blank: EntryContent = serde_json::from_value(json).unwrap();
        let err = e
            .propose(EntryType::AuditSeal, blank, ChainLevel::Root)
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        let mut json = serde_json::to_value(audit("x")).unwrap();
        json["anomaly_score"] = 1.7.into();
        let out_of_range: EntryContent = serde_json::from_value(json).unwrap();
        assert!(e
            .propose(EntryType::AuditSeal, out_of_range, ChainLevel::Root)
            .is_err());
        assert!(e.pending_entries().is_empty());
    }
}
