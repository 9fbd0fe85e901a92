//! Settlement façade
//!
//! Turns bilateral statements, conservation checks and ADP discharges into
//! consensus proposals, and answers verification queries over them.
//!
//! Double-spends are raised as errors after a permanent
//! `double_spend_alert` entry has been proposed. Callers must handle
//! [`LedgerError::DoubleSpend`] explicitly.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{info, warn};

use crate::consensus::{ChainProof, ConsensusEngine, EntryVerification};
use crate::constants::{ADP_PROOF_PREFIX, CONSERVATION_PROOF_PREFIX, CONSERVATION_TOLERANCE};
use crate::crypto::MerkleProof;
use crate::error::{LedgerError, LedgerResult};
use crate::logging::operations;
use crate::types::{
    short_id, BilateralStatement, ChainLevel, ConsensusState, ContentPayload, Entry, EntryContent,
    EntryId, EntryType,
};

/// A finalized, block-sealed settlement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementRecord {
    /// Statement id of the settled statement
    pub settlement_id: String,
    pub statement: BilateralStatement,
    pub entry_id: EntryId,
    pub block_height: Option<u64>,
    pub merkle_proof: Option<MerkleProof>,
    pub conservation_verified: bool,
    /// Conservation proof attached to this settlement, if any
    pub conservation_proof_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// ATP conservation check across societies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConservationProof {
    pub proof_id: String,
    pub entry_id: EntryId,
    pub balances: BTreeMap<String, Decimal>,
    pub total_atp: Decimal,
    pub expected_total: Decimal,
    /// `|total_atp - expected_total|`
    pub drift: Decimal,
    pub conserved: bool,
    pub timestamp: DateTime<Utc>,
}

/// Anchored ADP discharge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdpProof {
    pub adp_id: String,
    pub entry_id: EntryId,
    pub grant_id: String,
    pub discharged: Decimal,
    pub remaining: Decimal,
    pub evidence_digest: String,
    pub timestamp: DateTime<Utc>,
}

/// Alert raised when a statement reuses a settled transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoubleSpendAlert {
    pub transfer_id: String,
    pub statement_id: String,
    pub alert_entry_id: EntryId,
    pub timestamp: DateTime<Utc>,
}

/// Result of `verify_settlement`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementVerification {
    pub settlement_id: String,
    /// Chain verification passed
    pub verified: bool,
    /// Set when the settlement is unknown
    pub reason: Option<String>,
    pub chain_verification: Option<EntryVerification>,
    pub block_height: Option<u64>,
    pub conservation_verified: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementStats {
    pub settlements: usize,
    pub conservation_proofs: usize,
    pub adp_proofs: usize,
    pub double_spend_alerts: usize,
    pub chain: ChainProof,
}

/// Settlement records kept alongside one consensus engine
#[derive(Debug, Clone, Default)]
pub struct SettlementService {
    settlements: Vec<SettlementRecord>,
    conservation_proofs: Vec<ConservationProof>,
    adp_proofs: Vec<AdpProof>,
    alerts: Vec<DoubleSpendAlert>,
    /// Statement ids already proposed as settlements
    anchored_statements: HashSet<String>,
}

impl SettlementService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Propose a bilateral settlement
    ///
    /// Every referenced transfer id is checked first. On the first one that
    /// was already settled, a `double_spend_alert` is proposed and
    /// [`LedgerError::DoubleSpend`] returned without proposing the
    /// settlement. A statement id that was already anchored is refused with
    /// [`LedgerError::DuplicateStatement`]. Otherwise the settlement is
    /// proposed and all its transfer ids are marked settled immediately.
    pub fn anchor_settlement(
        &mut self,
        engine: &mut ConsensusEngine,
        statement: BilateralStatement,
    ) -> LedgerResult<Entry> {
        statement.validate()?;

        if let Some(transfer_id) = statement
            .transfer_ids
            .iter()
            .find(|t| engine.detect_double_spend(t))
        {
            let alert = EntryContent::new(ContentPayload::DoubleSpendAlert {
                transfer_id: transfer_id.clone(),
                statement_id: statement.statement_id.clone(),
                society_a: statement.society_a.clone(),
                society_b: statement.society_b.clone(),
            })?;
            let alert_entry = engine.propose(EntryType::DoubleSpendAlert, alert, ChainLevel::Root)?;
            self.alerts.push(DoubleSpendAlert {
                transfer_id: transfer_id.clone(),
                statement_id: statement.statement_id.clone(),
                alert_entry_id: alert_entry.entry_id.clone(),
                timestamp: Utc::now(),
            });

            warn!(
                transfer_id = %transfer_id,
                statement_id = %statement.statement_id,
                entry_id = %alert_entry.entry_id,
                operation = operations::DOUBLE_SPEND,
                "Double-spend detected"
            );
            return Err(LedgerError::DoubleSpend {
                transfer_id: transfer_id.clone(),
                alert_entry_id: alert_entry.entry_id.to_string(),
            });
        }

        if self.anchored_statements.contains(&statement.statement_id) {
            return Err(LedgerError::DuplicateStatement(statement.statement_id));
        }

        let statement_id = statement.statement_id.clone();
        let transfer_ids = statement.transfer_ids.clone();
        let content = EntryContent::new(ContentPayload::BilateralSettlement(statement))?;
        let entry = engine.propose(EntryType::BilateralSettlement, content, ChainLevel::Root)?;
        for transfer_id in transfer_ids {
            engine.record_settlement(transfer_id);
        }
        self.anchored_statements.insert(statement_id);

        info!(
            entry_id = %entry.entry_id,
            operation = operations::ANCHOR_SETTLEMENT,
            "Settlement anchored"
        );
        Ok(entry)
    }

    /// Package a sealed settlement
    ///
    /// `Ok(None)` until the entry is Finalized. Repeated calls return the
    /// same record; another entry carrying an already recorded statement id
    /// is refused.
    pub fn finalize_settlement(
        &mut self,
        engine: &ConsensusEngine,
        entry_id: &EntryId,
    ) -> LedgerResult<Option<SettlementRecord>> {
        if let Some(existing) = self.settlements.iter().find(|s| &s.entry_id == entry_id) {
            return Ok(Some(existing.clone()));
        }

        let entry = engine
            .get_entry(entry_id)
            .ok_or_else(|| LedgerError::NotFound(format!("entry {}", entry_id)))?;
        let statement = entry.content.statement().ok_or_else(|| {
            LedgerError::Validation(format!(
                "entry {} is {}, not a settlement",
                entry_id, entry.entry_type
            ))
        })?;
        if entry.consensus_state != ConsensusState::Finalized {
            return Ok(None);
        }
        if self.settlement(&statement.statement_id).is_some() {
            return Err(LedgerError::DuplicateStatement(
                statement.statement_id.clone(),
            ));
        }

        let record = SettlementRecord {
            settlement_id: statement.statement_id.clone(),
            statement: statement.clone(),
            entry_id: entry_id.clone(),
            block_height: entry.block_height,
            merkle_proof: entry.merkle_proof.clone(),
            conservation_verified: false,
            conservation_proof_id: None,
            timestamp: Utc::now(),
        };
        self.settlements.push(record.clone());
        Ok(Some(record))
    }

    /// Anchor a conservation check
    ///
    /// `conserved` iff the balances sum to within 0.001 of `expected_total`.
    /// The proof is anchored either way.
    pub fn anchor_conservation_proof(
        &mut self,
        engine: &mut ConsensusEngine,
        balances: BTreeMap<String, Decimal>,
        expected_total: Decimal,
    ) -> LedgerResult<ConservationProof> {
        let total_atp = balances
            .values()
            .try_fold(Decimal::ZERO, |acc, b| acc.checked_add(*b))
            .ok_or_else(|| LedgerError::Validation("balance total overflows".into()))?;
        let drift = total_atp
            .checked_sub(expected_total)
            .ok_or_else(|| LedgerError::Validation("conservation drift overflows".into()))?
            .abs();
        let conserved = drift < CONSERVATION_TOLERANCE;
        let proof_id = format!("{}:{}", CONSERVATION_PROOF_PREFIX, short_id());

        let content = EntryContent::new(ContentPayload::ConservationProof {
            proof_id: proof_id.clone(),
            total_atp,
            expected_total,
            drift,
            conserved,
            society_count: balances.len(),
        })?;
        let entry = engine.propose(EntryType::ConservationProof, content, ChainLevel::Root)?;

        if conserved {
            info!(
                entry_id = %entry.entry_id,
                operation = operations::ANCHOR_CONSERVATION,
                "Conservation proof anchored"
            );
        } else {
            warn!(
                entry_id = %entry.entry_id,
                drift = %drift,
                operation = operations::ANCHOR_CONSERVATION,
                "Conservation violated"
            );
        }

        let proof = ConservationProof {
            proof_id,
            entry_id: entry.entry_id,
            balances,
            total_atp,
            expected_total,
            drift,
            conserved,
            timestamp: Utc::now(),
        };
        self.conservation_proofs.push(proof.clone());
        Ok(proof)
    }

    /// Anchor an ADP discharge at Stem level
    ///
    /// Amounts are recorded as given; checking them against the grant
    /// ceiling is the caller's job.
    pub fn anchor_adp_discharge(
        &mut self,
        engine: &mut ConsensusEngine,
        grant_id: impl Into<String>,
        discharged: Decimal,
        remaining: Decimal,
        evidence_digest: impl Into<String>,
    ) -> LedgerResult<AdpProof> {
        let adp_id = format!("{}:{}", ADP_PROOF_PREFIX, short_id());
        let grant_id = grant_id.into();
        let evidence_digest = evidence_digest.into();

        let content = EntryContent::new(ContentPayload::AdpDischarge {
            adp_id: adp_id.clone(),
            grant_id: grant_id.clone(),
            discharged,
            remaining,
            evidence_digest: evidence_digest.clone(),
        })?;
        let entry = engine.propose(EntryType::AdpDischarge, content, ChainLevel::Stem)?;

        info!(
            entry_id = %entry.entry_id,
            grant_id = %grant_id,
            operation = operations::ANCHOR_DISCHARGE,
            "ADP discharge anchored"
        );

        let proof = AdpProof {
            adp_id,
            entry_id: entry.entry_id,
            grant_id,
            discharged,
            remaining,
            evidence_digest,
            timestamp: Utc::now(),
        };
        self.adp_proofs.push(proof.clone());
        Ok(proof)
    }

    /// Chain verification of a settlement plus its conservation flag
    pub fn verify_settlement(
        &self,
        engine: &ConsensusEngine,
        settlement_id: &str,
    ) -> SettlementVerification {
        let Some(record) = self.settlement(settlement_id) else {
            return SettlementVerification {
                settlement_id: settlement_id.to_string(),
                verified: false,
                reason: Some("settlement_not_found".to_string()),
                chain_verification: None,
                block_height: None,
                conservation_verified: false,
            };
        };

        let chain = engine.verify_entry(&record.entry_id);
        SettlementVerification {
            settlement_id: settlement_id.to_string(),
            verified: chain.verified,
            reason: None,
            chain_verification: Some(chain),
            block_height: record.block_height,
            conservation_verified: record.conservation_verified,
        }
    }

    /// Set the conservation flag on a settlement
    pub fn mark_conservation_verified(&mut self, settlement_id: &str) -> LedgerResult<()> {
        let record = self.settlement_mut(settlement_id)?;
        record.conservation_verified = true;
        Ok(())
    }

    /// Attach an anchored conservation proof; the flag follows its outcome
    pub fn attach_conservation_proof(
        &mut self,
        settlement_id: &str,
        proof_id: &str,
    ) -> LedgerResult<bool> {
        let conserved = self
            .conservation_proofs
            .iter()
            .find(|p| p.proof_id == proof_id)
            .map(|p| p.conserved)
            .ok_or_else(|| LedgerError::NotFound(format!("conservation proof {}", proof_id)))?;
        let record = self.settlement_mut(settlement_id)?;
        record.conservation_proof_id = Some(proof_id.to_string());
        record.conservation_verified = conserved;
        Ok(conserved)
    }

    pub fn settlement(&self, settlement_id: &str) -> Option<&SettlementRecord> {
        self.settlements
            .iter()
            .find(|s| s.settlement_id == settlement_id)
    }

    fn settlement_mut(&mut self, settlement_id: &str) -> LedgerResult<&mut SettlementRecord> {
        self.settlements
            .iter_mut()
            .find(|s| s.settlement_id == settlement_id)
            .ok_or_else(|| LedgerError::NotFound(format!("settlement {}", settlement_id)))
    }

    pub fn settlements(&self) -> &[SettlementRecord] {
        &self.settlements
    }

    pub fn conservation_proofs(&self) -> &[ConservationProof] {
        &self.conservation_proofs
    }

    pub fn adp_proofs(&self) -> &[AdpProof] {
        &self.adp_proofs
    }

    pub fn double_spend_alerts(&self) -> &[DoubleSpendAlert] {
        &self.alerts
    }

    pub fn get_stats(&self, engine: &ConsensusEngine) -> SettlementStats {
        SettlementStats {
            settlements: self.settlements.len(),
            conservation_proofs: self.conservation_proofs.len(),
            adp_proofs: self.adp_proofs.len(),
            double_spend_alerts: self.alerts.len(),
            chain: engine.get_chain_proof(),
        }
    }
}
