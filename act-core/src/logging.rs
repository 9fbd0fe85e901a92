//! Logging Standards and Conventions
//!
//! Logging conventions for the ACT settlement ledger. Every module logs
//! through `tracing` with structured fields and the operation names below.
//!
//! # Log Levels
//!
//! | Level | Usage | Examples |
//! |-------|-------|----------|
//! | ERROR | Broken invariants | Block hash chain broken |
//! | WARN  | Policy violations, failed checks | Double-spend, unauthorized vote |
//! | INFO  | State changes | Proposal, block sealed, promotion |
//! | DEBUG | Operation detail | Vote recorded, SNARC score |
//! | TRACE | Fine-grained detail | Merkle paths |
//!
//! # Structured Logging Fields
//!
//! - `entry_id`: Entry identifier
//! - `witness_id`: Consensus node identifier
//! - `block_height`: Sealed block height
//! - `operation`: Operation name from [`operations`]
//!
//! # Examples
//!
//! ```ignore
//! use tracing::info;
//! use act_core::logging::operations;
//!
//! info!(
//!     entry_id = %entry.entry_id,
//!     entry_type = %entry.entry_type,
//!     operation = operations::PROPOSE,
//!     "Entry proposed"
//! );
//! ```

use serde::{Deserialize, Serialize};

/// Log level enumeration matching tracing levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Broken invariants
    Error,
    /// Policy violations
    Warn,
    /// State changes
    #[default]
    Info,
    /// Operation detail
    Debug,
    /// Fine-grained tracing
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }

    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "error" => Some(Self::Error),
            "warn" | "warning" => Some(Self::Warn),
            "info" => Some(Self::Info),
            "debug" => Some(Self::Debug),
            "trace" => Some(Self::Trace),
            _ => None,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Operation names for the `operation` field
pub mod operations {
    // Consensus
    pub const PROPOSE: &str = "propose";
    pub const VOTE: &str = "vote";
    pub const FINALIZE: &str = "finalize";
    pub const REJECT: &str = "reject";
    pub const SEAL_BLOCK: &str = "seal_block";
    pub const RESOLVE_FORK: &str = "resolve_fork";

    // Verification
    pub const VERIFY_ENTRY: &str = "verify_entry";
    pub const CHAIN_PROOF: &str = "chain_proof";

    // Lifecycle
    pub const INGEST: &str = "ingest";
    pub const EVICT: &str = "evict";
    pub const PROMOTE: &str = "promote";

    // Settlement
    pub const ANCHOR_SETTLEMENT: &str = "anchor_settlement";
    pub const ANCHOR_CONSERVATION: &str = "anchor_conservation";
    pub const ANCHOR_DISCHARGE: &str = "anchor_discharge";
    pub const DOUBLE_SPEND: &str = "double_spend";
}
