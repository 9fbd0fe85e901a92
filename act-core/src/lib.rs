//! ACT Core - Settlement Ledger
//!
//! The ACT chain is an append-only, witness-voted ledger that anchors
//! inter-society settlements, ATP conservation checks and ADP discharges.
//! Records pass through four lifecycle tiers, each with its own ATP cost:
//!
//! ```text
//!   ingest ──► Compost (0) ──► Leaf (5) ──► Stem (50) ──► Root (200)
//!              ring buffer     SNARC ≥ 3    SNARC ≥ 5     witness consensus
//!                                                          + sealed blocks
//! ```
//!
//! # Key Properties
//!
//! 1. **Witness consensus**: Root entries need both a per-type witness count
//!    and an accept ratio over all consensus nodes
//! 2. **Tamper evidence**: blocks chain by hash from a fixed genesis, and
//!    every sealed entry carries a Merkle inclusion proof
//! 3. **Double-spend detection**: a transfer id settles at most once; a
//!    second attempt anchors a permanent alert and fails
//! 4. **Proportional cost**: SNARC scoring keeps routine records cheap
//!
//! # Core Types
//!
//! - [`ConsensusEngine`]: proposal, vote, accept and seal lifecycle
//! - [`FractalChainManager`]: Compost/Leaf/Stem tiers and promotion
//! - [`SettlementService`]: settlement, conservation and discharge anchoring
//! - [`SnarcScorer`]: five-dimension salience scoring
//! - [`MerkleTree`] / [`MerkleProof`]: inclusion proofs over content hashes
//! - [`SharedLedger`]: async read/write handle over all of the above

pub mod canon;
pub mod config;
pub mod consensus;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod fractal;
pub mod logging;
pub mod settlement;
pub mod shared;
pub mod snarc;
pub mod types;

#[cfg(test)]
mod invariant_tests;

pub use canon::Canonicalizer;
pub use config::LedgerConfig;
pub use consensus::{
    ChainProof, ConsensusEngine, EntryVerification, ForkTieBreak, VerificationFailure,
};
pub use crypto::{MerkleProof, MerkleTree};
pub use error::{ConfigError, LedgerError, LedgerResult};
pub use fractal::{FractalChainManager, FractalStats, Promotion};
pub use settlement::{
    AdpProof, ConservationProof, DoubleSpendAlert, SettlementRecord, SettlementService,
    SettlementStats, SettlementVerification,
};
pub use shared::{LedgerState, SharedLedger};
pub use snarc::{NoveltyTracker, SnarcScore, SnarcScorer};
pub use types::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use constants::PROTOCOL_VERSION;
