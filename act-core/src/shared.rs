//! Shared ledger handle
//!
//! The engine, lifecycle manager and settlement façade are single-owner.
//! `SharedLedger` puts all three behind one `tokio::sync::RwLock` so that a
//! vote's duplicate check, append and threshold check happen under a single
//! write lock, and concurrent seals are serialized.

use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::LedgerConfig;
use crate::consensus::{ChainProof, ConsensusEngine, EntryVerification};
use crate::error::{ConfigError, LedgerResult};
use crate::fractal::{FractalChainManager, FractalStats};
use crate::settlement::{SettlementRecord, SettlementService, SettlementStats, SettlementVerification};
use crate::types::{
    BilateralStatement, Block, ChainLevel, Entry, EntryContent, EntryId, EntryType, WitnessId,
    WitnessVote,
};

/// Everything one ledger instance owns
#[derive(Debug, Clone)]
pub struct LedgerState {
    pub engine: ConsensusEngine,
    pub fractal: FractalChainManager,
    pub settlement: SettlementService,
}

impl LedgerState {
    pub fn from_config(config: &LedgerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            engine: ConsensusEngine::from_config(config)?,
            fractal: FractalChainManager::from_config(config),
            settlement: SettlementService::new(),
        })
    }
}

/// Cloneable async handle over a [`LedgerState`]
#[derive(Debug, Clone)]
pub struct SharedLedger {
    state: Arc<RwLock<LedgerState>>,
}

impl SharedLedger {
    pub fn new(state: LedgerState) -> Self {
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    pub fn from_config(config: &LedgerConfig) -> Result<Self, ConfigError> {
        LedgerState::from_config(config).map(Self::new)
    }

    /// Run `f` under the read lock
    pub async fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&LedgerState) -> R,
    {
        let guard = self.state.read().await;
        f(&guard)
    }

    /// Run `f` under the write lock
    pub async fn write<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut LedgerState) -> R,
    {
        let mut guard = self.state.write().await;
        f(&mut guard)
    }

    pub async fn propose(
        &self,
        entry_type: EntryType,
        content: EntryContent,
        chain_level: ChainLevel,
    ) -> LedgerResult<Entry> {
        self.write(|s| s.engine.propose(entry_type, content, chain_level))
            .await
    }

    pub async fn submit_vote(
        &self,
        entry_id: &EntryId,
        witness_id: &WitnessId,
        accept: bool,
        reason: Option<String>,
    ) -> LedgerResult<WitnessVote> {
        self.write(|s| s.engine.submit_vote(entry_id, witness_id, accept, reason))
            .await
    }

    /// Vote, then finalize if the threshold is now met
    ///
    /// Returns whether the entry is accepted after this vote.
    pub async fn vote_and_finalize(
        &self,
        entry_id: &EntryId,
        witness_id: &WitnessId,
        accept: bool,
    ) -> LedgerResult<bool> {
        self.write(|s| -> LedgerResult<bool> {
            s.engine.submit_vote(entry_id, witness_id, accept, None)?;
            if s.engine.check_consensus(entry_id).0 {
                s.engine.finalize_entry(entry_id)
            } else {
                Ok(false)
            }
        })
        .await
    }

    pub async fn check_consensus(&self, entry_id: &EntryId) -> (bool, f64) {
        self.read(|s| s.engine.check_consensus(entry_id)).await
    }

    pub async fn finalize_entry(&self, entry_id: &EntryId) -> LedgerResult<bool> {
        self.write(|s| s.engine.finalize_entry(entry_id)).await
    }

    pub async fn seal_block(&self) -> Option<Block> {
        self.write(|s| s.engine.seal_block()).await
    }

    pub async fn verify_entry(&self, entry_id: &EntryId) -> EntryVerification {
        self.read(|s| s.engine.verify_entry(entry_id)).await
    }

    pub async fn get_chain_proof(&self) -> ChainProof {
        self.read(|s| s.engine.get_chain_proof()).await
    }

    pub async fn get_entry(&self, entry_id: &EntryId) -> Option<Entry> {
        self.read(|s| s.engine.get_entry(entry_id).cloned()).await
    }

    pub async fn ingest(&self, entry_type: EntryType, content: EntryContent) -> LedgerResult<Entry> {
        self.write(|s| s.fractal.ingest(entry_type, content)).await
    }

    pub async fn promote_to_root(&self, entry_id: &EntryId) -> LedgerResult<Option<Entry>> {
        self.write(|s| s.fractal.promote_to_root(&mut s.engine, entry_id))
            .await
    }

    pub async fn fractal_stats(&self) -> FractalStats {
        self.read(|s| s.fractal.get_stats(&s.engine)).await
    }

    pub async fn anchor_settlement(&self, statement: BilateralStatement) -> LedgerResult<Entry> {
        self.write(|s| s.settlement.anchor_settlement(&mut s.engine, statement))
            .await
    }

    pub async fn finalize_settlement(
        &self,
        entry_id: &EntryId,
    ) -> LedgerResult<Option<SettlementRecord>> {
        self.write(|s| s.settlement.finalize_settlement(&s.engine, entry_id))
            .await
    }

    pub async fn verify_settlement(&self, settlement_id: &str) -> SettlementVerification {
        self.read(|s| s.settlement.verify_settlement(&s.engine, settlement_id))
            .await
    }

    pub async fn settlement_stats(&self) -> SettlementStats {
        self.read(|s| s.settlement.get_stats(&s.engine)).await
    }
}
