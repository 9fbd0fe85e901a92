//! Error types for ACT Core
//!
//! Structural violations (unknown ids, unauthorized witnesses, duplicate
//! votes, double-spends) surface as `LedgerError`. A consensus threshold that
//! is not met yet is not an error; those operations return `false`.

use thiserror::Error;

/// Ledger operation errors
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Witness {0} is not a consensus node")]
    Unauthorized(String),

    #[error("Duplicate vote: witness {witness_id} already voted on {entry_id}")]
    DuplicateVote { entry_id: String, witness_id: String },

    #[error("Double-spend detected: transfer {transfer_id} already settled (alert {alert_entry_id})")]
    DoubleSpend {
        transfer_id: String,
        alert_entry_id: String,
    },

    #[error("Fork tie between candidates: {0:?}")]
    ForkTie(Vec<String>),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Statement {0} is already anchored")]
    DuplicateStatement(String),

    /// Verification results are reported as structs; this is raised only
    /// when a caller asks for a failed result to become an error.
    #[error("Integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LedgerError {
    /// Conflicts: duplicate votes, double-spends, reused statement ids and
    /// unresolved fork ties
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::DuplicateVote { .. }
                | Self::DoubleSpend { .. }
                | Self::DuplicateStatement(_)
                | Self::ForkTie(_)
        )
    }

    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::IntegrityViolation(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Configuration validation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("At least one consensus node is required")]
    NoConsensusNodes,

    #[error("Duplicate consensus node: {0}")]
    DuplicateNode(String),

    #[error("Consensus threshold must be in (0, 1], got {0}")]
    InvalidThreshold(f64),

    #[error("Compost capacity must be greater than zero")]
    ZeroCapacity,

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Result type alias for Ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
