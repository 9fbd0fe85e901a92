//! SNARC scoring
//!
//! Five-factor significance score (Significant, Novel, Anomalous, Relevant,
//! Consequential) that decides whether an ingested entry is dropped,
//! retained at Leaf, or promoted to Stem.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

use crate::constants::{
    snarc_weights, ANOMALY_THRESHOLD, DEFAULT_SIGNIFICANCE_THRESHOLD, SNARC_PROMOTE_THRESHOLD,
    SNARC_RETAIN_THRESHOLD,
};
use crate::logging::operations;
use crate::types::{Entry, EntryType};

/// SNARC score for one entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnarcScore {
    pub significant: u32,
    pub novel: u32,
    pub anomalous: u32,
    pub relevant: u32,
    pub consequential: u32,
}

impl SnarcScore {
    pub fn total(&self) -> u32 {
        self.significant + self.novel + self.anomalous + self.relevant + self.consequential
    }

    /// Keep at Leaf
    pub fn should_retain(&self) -> bool {
        self.total() >= SNARC_RETAIN_THRESHOLD
    }

    /// Move to Stem
    pub fn should_promote(&self) -> bool {
        self.total() >= SNARC_PROMOTE_THRESHOLD
    }
}

/// Seen `(entry_type, subtype)` keys
///
/// Owned by whoever drives ingestion; cleared only through [`reset`].
///
/// [`reset`]: NoveltyTracker::reset
#[derive(Debug, Clone, Default)]
pub struct NoveltyTracker {
    seen: HashSet<(EntryType, Option<String>)>,
}

impl NoveltyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a key; returns true the first time it is seen
    pub fn observe(&mut self, entry_type: EntryType, subtype: Option<&str>) -> bool {
        self.seen.insert((entry_type, subtype.map(str::to_owned)))
    }

    pub fn has_seen(&self, entry_type: EntryType, subtype: Option<&str>) -> bool {
        self.seen.contains(&(entry_type, subtype.map(str::to_owned)))
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn reset(&mut self) {
        self.seen.clear();
    }
}

/// SNARC scorer with configurable significance threshold
#[derive(Debug, Clone, Copy)]
pub struct SnarcScorer {
    significance_threshold: u64,
}

impl Default for SnarcScorer {
    fn default() -> Self {
        Self::new(DEFAULT_SIGNIFICANCE_THRESHOLD)
    }
}

impl SnarcScorer {
    pub fn new(significance_threshold: u64) -> Self {
        Self {
            significance_threshold,
        }
    }

    pub fn significance_threshold(&self) -> u64 {
        self.significance_threshold
    }

    /// Score an entry
    ///
    /// Mutates `novelty`: the entry's key is recorded, so an identical key
    /// scores Novel = 0 on every later call.
    pub fn compute(
        &self,
        entry: &Entry,
        novelty: &mut NoveltyTracker,
        relevance_scope: &BTreeSet<String>,
    ) -> SnarcScore {
        let mut score = SnarcScore::default();

        if entry.atp_cost > self.significance_threshold {
            score.significant = snarc_weights::SIGNIFICANT;
        }

        if novelty.observe(entry.entry_type, entry.content.subtype()) {
            score.novel = snarc_weights::NOVEL;
        }

        if entry
            .content
            .anomaly_score()
            .is_some_and(|a| a > ANOMALY_THRESHOLD)
        {
            score.anomalous = snarc_weights::ANOMALOUS;
        }

        if entry
            .content
            .references()
            .iter()
            .any(|r| relevance_scope.contains(*r))
        {
            score.relevant = snarc_weights::RELEVANT;
        }

        if entry.entry_type.is_consequential() {
            score.consequential = snarc_weights::CONSEQUENTIAL;
        }

        debug!(
            entry_id = %entry.entry_id,
            entry_type = %entry.entry_type,
            total = score.total(),
            operation = operations::INGEST,
            "SNARC score computed"
        );

        score
    }
}
