//! Typed entry content
//!
//! Every entry carries exactly one payload variant, keyed by its
//! `EntryType`. Payloads are validated when content is built, so the rest
//! of the ledger never looks up fields ad hoc.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::common::short_id;
use super::entry::EntryType;
use crate::constants::STATEMENT_PREFIX;
use crate::error::{LedgerError, LedgerResult};

/// Bilateral statement between two societies, supplied by the ATP sync layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BilateralStatement {
    pub statement_id: String,
    pub society_a: String,
    pub society_b: String,
    pub a_balance: Decimal,
    pub b_balance: Decimal,
    pub net_position: Decimal,
    pub transfers_reconciled: u32,
    pub transfer_ids: Vec<String>,
}

impl BilateralStatement {
    /// Create a statement between two distinct societies
    ///
    /// The statement id defaults to `stmt:<12 hex>`.
    pub fn new(society_a: impl Into<String>, society_b: impl Into<String>) -> LedgerResult<Self> {
        let statement = Self {
            statement_id: format!("{}:{}", STATEMENT_PREFIX, short_id()),
            society_a: society_a.into(),
            society_b: society_b.into(),
            a_balance: Decimal::ZERO,
            b_balance: Decimal::ZERO,
            net_position: Decimal::ZERO,
            transfers_reconciled: 0,
            transfer_ids: Vec::new(),
        };
        statement.validate()?;
        Ok(statement)
    }

    pub fn with_id(mut self, statement_id: impl Into<String>) -> Self {
        self.statement_id = statement_id.into();
        self
    }

    pub fn with_balances(mut self, a_balance: Decimal, b_balance: Decimal) -> Self {
        self.a_balance = a_balance;
        self.b_balance = b_balance;
        self
    }

    pub fn with_net_position(mut self, net_position: Decimal) -> Self {
        self.net_position = net_position;
        self
    }

    /// Set the referenced transfer ids; `transfers_reconciled` follows their count
    pub fn with_transfer_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.transfer_ids = ids.into_iter().map(Into::into).collect();
        self.transfers_reconciled = self.transfer_ids.len() as u32;
        self
    }

    pub fn validate(&self) -> LedgerResult<()> {
        require_non_empty("statement_id", &self.statement_id)?;
        require_non_empty("society_a", &self.society_a)?;
        require_non_empty("society_b", &self.society_b)?;
        if self.society_a == self.society_b {
            return Err(LedgerError::Validation(format!(
                "bilateral statement needs two distinct societies, got {} twice",
                self.society_a
            )));
        }
        if let Some(empty) = self.transfer_ids.iter().position(|t| t.trim().is_empty()) {
            return Err(LedgerError::Validation(format!(
                "transfer id at position {} is empty",
                empty
            )));
        }
        Ok(())
    }
}

/// ATP transfer between societies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub transfer_id: String,
    pub source_society: String,
    pub target_society: String,
    pub amount: Decimal,
    pub reason: Option<String>,
}

/// Payload variants, one per entry type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entry_type", rename_all = "snake_case")]
pub enum ContentPayload {
    BilateralSettlement(BilateralStatement),
    AdpDischarge {
        adp_id: String,
        grant_id: String,
        discharged: Decimal,
        remaining: Decimal,
        evidence_digest: String,
    },
    ConservationProof {
        proof_id: String,
        total_atp: Decimal,
        expected_total: Decimal,
        drift: Decimal,
        conserved: bool,
        society_count: usize,
    },
    LctRegistration {
        entity_id: String,
        society_id: String,
    },
    CharterAmendment {
        society_id: String,
        amendment: String,
        new_value: String,
    },
    CredentialIssuance {
        entity_id: String,
        issuer_id: String,
        credential_type: String,
    },
    AuditSeal {
        scope: String,
        sealed_digest: String,
        entity_id: Option<String>,
    },
    TransferCommit(TransferRecord),
    TransferComplete(TransferRecord),
    DoubleSpendAlert {
        transfer_id: String,
        statement_id: String,
        society_a: String,
        society_b: String,
    },
}

impl ContentPayload {
    pub fn entry_type(&self) -> EntryType {
        match self {
            Self::BilateralSettlement(_) => EntryType::BilateralSettlement,
            Self::AdpDischarge { .. } => EntryType::AdpDischarge,
            Self::ConservationProof { .. } => EntryType::ConservationProof,
            Self::LctRegistration { .. } => EntryType::LctRegistration,
            Self::CharterAmendment { .. } => EntryType::CharterAmendment,
            Self::CredentialIssuance { .. } => EntryType::CredentialIssuance,
            Self::AuditSeal { .. } => EntryType::AuditSeal,
            Self::TransferCommit(_) => EntryType::TransferCommit,
            Self::TransferComplete(_) => EntryType::TransferComplete,
            Self::DoubleSpendAlert { .. } => EntryType::DoubleSpendAlert,
        }
    }

    /// Society and entity ids this payload refers to
    ///
    /// Drawn from `society_a`, `society_b`, `source_society`,
    /// `target_society` and `entity_id`.
    pub fn references(&self) -> Vec<&str> {
        match self {
            Self::BilateralSettlement(s) => vec![s.society_a.as_str(), s.society_b.as_str()],
            Self::DoubleSpendAlert {
                society_a,
                society_b,
                ..
            } => vec![society_a.as_str(), society_b.as_str()],
            Self::TransferCommit(t) | Self::TransferComplete(t) => {
                vec![t.source_society.as_str(), t.target_society.as_str()]
            }
            Self::LctRegistration { entity_id, .. } | Self::CredentialIssuance { entity_id, .. } => {
                vec![entity_id.as_str()]
            }
            Self::AuditSeal { entity_id, .. } => entity_id.iter().map(String::as_str).collect(),
            Self::AdpDischarge { .. }
            | Self::ConservationProof { .. }
            | Self::CharterAmendment { .. } => Vec::new(),
        }
    }

    pub fn validate(&self) -> LedgerResult<()> {
        match self {
            Self::BilateralSettlement(s) => s.validate(),
            Self::AdpDischarge {
                adp_id,
                grant_id,
                evidence_digest,
                ..
            } => {
                require_non_empty("adp_id", adp_id)?;
                require_non_empty("grant_id", grant_id)?;
                require_non_empty("evidence_digest", evidence_digest)
            }
            Self::ConservationProof { proof_id, drift, .. } => {
                require_non_empty("proof_id", proof_id)?;
                if drift.is_sign_negative() && !drift.is_zero() {
                    return Err(LedgerError::Validation("drift must be non-negative".into()));
                }
                Ok(())
            }
            Self::LctRegistration {
                entity_id,
                society_id,
            } => {
                require_non_empty("entity_id", entity_id)?;
                require_non_empty("society_id", society_id)
            }
            Self::CharterAmendment {
                society_id,
                amendment,
                ..
            } => {
                require_non_empty("society_id", society_id)?;
                require_non_empty("amendment", amendment)
            }
            Self::CredentialIssuance {
                entity_id,
                issuer_id,
                credential_type,
            } => {
                require_non_empty("entity_id", entity_id)?;
                require_non_empty("issuer_id", issuer_id)?;
                require_non_empty("credential_type", credential_type)
            }
            Self::AuditSeal {
                scope,
                sealed_digest,
                ..
            } => {
                require_non_empty("scope", scope)?;
                require_non_empty("sealed_digest", sealed_digest)
            }
            Self::TransferCommit(t) | Self::TransferComplete(t) => {
                require_non_empty("transfer_id", &t.transfer_id)?;
                require_non_empty("source_society", &t.source_society)?;
                require_non_empty("target_society", &t.target_society)
            }
            Self::DoubleSpendAlert { transfer_id, .. } => {
                require_non_empty("transfer_id", transfer_id)
            }
        }
    }
}

/// Content of an entry: typed payload plus the SNARC inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryContent {
    /// Subtype, combined with the entry type as the novelty key
    subtype: Option<String>,
    /// Anomaly score in [0, 1] supplied by the producer
    anomaly_score: Option<f64>,
    payload: ContentPayload,
}

impl EntryContent {
    /// Build validated content
    pub fn new(payload: ContentPayload) -> LedgerResult<Self> {
        payload.validate()?;
        Ok(Self {
            subtype: None,
            anomaly_score: None,
            payload,
        })
    }

    pub fn with_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = Some(subtype.into());
        self
    }

    pub fn with_anomaly_score(mut self, score: f64) -> LedgerResult<Self> {
        check_anomaly_score(score)?;
        self.anomaly_score = Some(score);
        Ok(self)
    }

    /// Re-check payload and anomaly score, e.g. after deserialization
    pub fn validate(&self) -> LedgerResult<()> {
        self.payload.validate()?;
        if let Some(score) = self.anomaly_score {
            check_anomaly_score(score)?;
        }
        Ok(())
    }

    pub fn payload(&self) -> &ContentPayload {
        &self.payload
    }

    pub fn entry_type(&self) -> EntryType {
        self.payload.entry_type()
    }

    pub fn subtype(&self) -> Option<&str> {
        self.subtype.as_deref()
    }

    pub fn anomaly_score(&self) -> Option<f64> {
        self.anomaly_score
    }

    pub fn references(&self) -> Vec<&str> {
        self.payload.references()
    }

    /// Statement carried by a bilateral settlement
    pub fn statement(&self) -> Option<&BilateralStatement> {
        match &self.payload {
            ContentPayload::BilateralSettlement(s) => Some(s),
            _ => None,
        }
    }
}

fn check_anomaly_score(score: f64) -> LedgerResult<()> {
    if !(0.0..=1.0).contains(&score) {
        return Err(LedgerError::Validation(format!(
            "anomaly score must be in [0, 1], got {}",
            score
        )));
    }
    Ok(())
}

fn require_non_empty(field: &str, value: &str) -> LedgerResult<()> {
    if value.trim().is_empty() {
        return Err(LedgerError::Validation(format!("{} must not be empty", field)));
    }
    Ok(())
}
