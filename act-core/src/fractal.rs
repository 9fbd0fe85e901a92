//! Fractal lifecycle manager
//!
//! Routes ingested records through the Compost, Leaf and Stem tiers by
//! SNARC score, and hands Stem records to the consensus engine on explicit
//! promotion to Root.
//!
//! Tier entries carry a tier-local placeholder link and never join the
//! consensus proposal chain until promoted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};
use tracing::{debug, info};

use crate::canon::Canonicalizer;
use crate::config::LedgerConfig;
use crate::consensus::ConsensusEngine;
use crate::constants::{DEFAULT_COMPOST_CAPACITY, FRACTAL_ENTRY_PREFIX};
use crate::error::{LedgerError, LedgerResult};
use crate::logging::operations;
use crate::snarc::{NoveltyTracker, SnarcScore, SnarcScorer};
use crate::types::{
    short_id, ChainLevel, ConsensusState, Digest, Entry, EntryContent, EntryId, EntryType,
};

/// One tier transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Promotion {
    pub entry_id: EntryId,
    /// Consensus entry created by a promotion to Root
    pub root_entry_id: Option<EntryId>,
    pub from: ChainLevel,
    pub to: ChainLevel,
    /// SNARC total for scoring-driven promotions
    pub snarc_total: Option<u32>,
    pub timestamp: DateTime<Utc>,
}

/// Per-tier counts and cumulative cost
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FractalStats {
    pub compost: usize,
    pub leaf: usize,
    pub stem: usize,
    /// Entries in sealed blocks
    pub root: usize,
    pub promotions: usize,
    /// Leaf + Stem + sealed Root ATP cost
    pub total_atp_cost: u64,
}

/// Lifecycle manager over Compost, Leaf and Stem
#[derive(Debug, Clone)]
pub struct FractalChainManager {
    compost: VecDeque<Entry>,
    compost_capacity: usize,
    leaf: Vec<Entry>,
    stem: Vec<Entry>,
    novelty: NoveltyTracker,
    relevance_scope: BTreeSet<String>,
    scorer: SnarcScorer,
    canon: Canonicalizer,
    promotion_log: Vec<Promotion>,
}

impl Default for FractalChainManager {
    fn default() -> Self {
        Self::new(DEFAULT_COMPOST_CAPACITY, SnarcScorer::default(), BTreeSet::new())
    }
}

impl FractalChainManager {
    pub fn new(
        compost_capacity: usize,
        scorer: SnarcScorer,
        relevance_scope: BTreeSet<String>,
    ) -> Self {
        Self {
            compost: VecDeque::with_capacity(compost_capacity.min(DEFAULT_COMPOST_CAPACITY)),
            compost_capacity: compost_capacity.max(1),
            leaf: Vec::new(),
            stem: Vec::new(),
            novelty: NoveltyTracker::new(),
            relevance_scope,
            scorer,
            canon: Canonicalizer::new(),
            promotion_log: Vec::new(),
        }
    }

    pub fn from_config(config: &LedgerConfig) -> Self {
        Self::new(
            config.compost_capacity,
            SnarcScorer::new(config.significance_threshold),
            config.relevance_scope.clone(),
        )
    }

    /// Ingest a record at Compost and let SNARC route it
    ///
    /// `should_promote` goes straight to Stem, `should_retain` to Leaf,
    /// anything else lives only in the Compost ring buffer.
    pub fn ingest(&mut self, entry_type: EntryType, content: EntryContent) -> LedgerResult<Entry> {
        if content.entry_type() != entry_type {
            return Err(LedgerError::Validation(format!(
                "content is {} but entry type is {}",
                content.entry_type(),
                entry_type
            )));
        }
        content.validate()?;

        let content_hash = self.canon.content_hash(&content)?;
        let mut entry = Entry {
            entry_id: EntryId::new(format!(
                "{}:{}:{}",
                FRACTAL_ENTRY_PREFIX,
                entry_type,
                short_id()
            )),
            entry_type,
            chain_level: ChainLevel::Compost,
            timestamp: Utc::now(),
            prev_hash: Digest::sha256(self.compost.len().to_string().as_bytes()),
            content,
            content_hash,
            votes: Vec::new(),
            merkle_proof: None,
            block_height: None,
            consensus_state: ConsensusState::Proposed,
            atp_cost: ChainLevel::Compost.atp_cost(),
        };

        let score = self
            .scorer
            .compute(&entry, &mut self.novelty, &self.relevance_scope);

        if score.should_promote() {
            self.place(&mut entry, ChainLevel::Stem, score);
        } else if score.should_retain() {
            self.place(&mut entry, ChainLevel::Leaf, score);
        }

        self.compost.push_back(entry.clone());
        while self.compost.len() > self.compost_capacity {
            if let Some(evicted) = self.compost.pop_front() {
                debug!(
                    entry_id = %evicted.entry_id,
                    operation = operations::EVICT,
                    "Compost entry evicted"
                );
            }
        }

        debug!(
            entry_id = %entry.entry_id,
            chain_level = %entry.chain_level,
            snarc_total = score.total(),
            operation = operations::INGEST,
            "Entry ingested"
        );
        Ok(entry)
    }

    fn place(&mut self, entry: &mut Entry, level: ChainLevel, score: SnarcScore) {
        entry.chain_level = level;
        entry.atp_cost = level.atp_cost();
        match level {
            ChainLevel::Stem => self.stem.push(entry.clone()),
            ChainLevel::Leaf => self.leaf.push(entry.clone()),
            ChainLevel::Compost | ChainLevel::Root => return,
        }
        self.promotion_log.push(Promotion {
            entry_id: entry.entry_id.clone(),
            root_entry_id: None,
            from: ChainLevel::Compost,
            to: level,
            snarc_total: Some(score.total()),
            timestamp: Utc::now(),
        });
        info!(
            entry_id = %entry.entry_id,
            chain_level = %level,
            snarc_total = score.total(),
            operation = operations::PROMOTE,
            "Entry promoted from compost"
        );
    }

    /// Propose a Stem entry to the consensus engine
    ///
    /// Only Stem entries qualify; `Ok(None)` for anything else. The Stem
    /// record stays in place.
    pub fn promote_to_root(
        &mut self,
        engine: &mut ConsensusEngine,
        entry_id: &EntryId,
    ) -> LedgerResult<Option<Entry>> {
        let Some(stem_entry) = self.stem.iter().find(|e| &e.entry_id == entry_id) else {
            return Ok(None);
        };

        let root = engine.propose(
            stem_entry.entry_type,
            stem_entry.content.clone(),
            ChainLevel::Root,
        )?;

        self.promotion_log.push(Promotion {
            entry_id: entry_id.clone(),
            root_entry_id: Some(root.entry_id.clone()),
            from: ChainLevel::Stem,
            to: ChainLevel::Root,
            snarc_total: None,
            timestamp: Utc::now(),
        });
        info!(
            entry_id = %entry_id,
            root_entry_id = %root.entry_id,
            operation = operations::PROMOTE,
            "Stem entry promoted to root"
        );
        Ok(Some(root))
    }

    pub fn get_stats(&self, engine: &ConsensusEngine) -> FractalStats {
        let blocks = engine.blocks();
        FractalStats {
            compost: self.compost.len(),
            leaf: self.leaf.len(),
            stem: self.stem.len(),
            root: blocks.iter().map(|b| b.entries.len()).sum(),
            promotions: self.promotion_log.len(),
            total_atp_cost: self.leaf.iter().map(|e| e.atp_cost).sum::<u64>()
                + self.stem.iter().map(|e| e.atp_cost).sum::<u64>()
                + blocks.iter().map(|b| b.total_atp_cost).sum::<u64>(),
        }
    }

    /// Look up an entry in Stem, then Leaf, then Compost
    pub fn find(&self, entry_id: &EntryId) -> Option<&Entry> {
        self.stem
            .iter()
            .chain(self.leaf.iter())
            .chain(self.compost.iter())
            .find(|e| &e.entry_id == entry_id)
    }

    pub fn compost(&self) -> impl Iterator<Item = &Entry> {
        self.compost.iter()
    }

    pub fn leaf(&self) -> &[Entry] {
        &self.leaf
    }

    pub fn stem(&self) -> &[Entry] {
        &self.stem
    }

    pub fn compost_capacity(&self) -> usize {
        self.compost_capacity
    }

    pub fn promotion_log(&self) -> &[Promotion] {
        &self.promotion_log
    }

    pub fn relevance_scope(&self) -> &BTreeSet<String> {
        &self.relevance_scope
    }

    pub fn novelty(&self) -> &NoveltyTracker {
        &self.novelty
    }

    /// Forget every seen `(entry_type, subtype)` key
    pub fn reset_novelty(&mut self) {
        self.novelty.reset();
    }
}
