//! Protocol Constants
//!
//! Centralized constants for the ACT settlement ledger.
//!
//! # Categories
//!
//! - **Costs**: ATP cost per chain level
//! - **Thresholds**: Consensus and SNARC thresholds
//! - **Defaults**: Default configuration values
//! - **Identifiers**: Genesis seed and id prefixes

use rust_decimal::Decimal;

// ============================================================================
// Protocol Versions
// ============================================================================

/// Current protocol version
pub const PROTOCOL_VERSION: &str = "1.0.0";

// ============================================================================
// ATP Costs
// ============================================================================

pub const ATP_COST_COMPOST: u64 = 0;
pub const ATP_COST_LEAF: u64 = 5;
pub const ATP_COST_STEM: u64 = 50;
pub const ATP_COST_ROOT: u64 = 200;

// ============================================================================
// Thresholds
// ============================================================================

/// Default accept ratio over all consensus nodes
pub const DEFAULT_CONSENSUS_THRESHOLD: f64 = 0.67;

/// Development accept ratio
pub const DEV_CONSENSUS_THRESHOLD: f64 = 0.6;

/// Conservation drift tolerance (0.001 ATP)
pub const CONSERVATION_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 3);

/// SNARC: ATP cost above which an entry is significant
pub const DEFAULT_SIGNIFICANCE_THRESHOLD: u64 = 10;

/// SNARC: content anomaly score above which an entry is anomalous
pub const ANOMALY_THRESHOLD: f64 = 0.7;

/// SNARC: total at which an entry is retained (Leaf)
pub const SNARC_RETAIN_THRESHOLD: u32 = 3;

/// SNARC: total at which an entry is promoted (Stem)
pub const SNARC_PROMOTE_THRESHOLD: u32 = 5;

/// SNARC factor weights
pub mod snarc_weights {
    pub const SIGNIFICANT: u32 = 2;
    pub const NOVEL: u32 = 3;
    pub const ANOMALOUS: u32 = 2;
    pub const RELEVANT: u32 = 1;
    pub const CONSEQUENTIAL: u32 = 2;
}

// ============================================================================
// Defaults
// ============================================================================

/// Default Compost ring buffer capacity
pub const DEFAULT_COMPOST_CAPACITY: usize = 1000;

/// Default consensus nodes
pub const DEFAULT_CONSENSUS_NODES: [&str; 5] = [
    "node-alpha",
    "node-beta",
    "node-gamma",
    "node-delta",
    "node-epsilon",
];

// ============================================================================
// Identifiers
// ============================================================================

/// Seed hashed into the genesis constant
pub const GENESIS_SEED: &str = "act:genesis:web4";

/// Prefix for consensus entries (`act:<type>:<id>`)
pub const CONSENSUS_ENTRY_PREFIX: &str = "act";

/// Prefix for lifecycle entries (`fc:<type>:<id>`)
pub const FRACTAL_ENTRY_PREFIX: &str = "fc";

pub const CONSERVATION_PROOF_PREFIX: &str = "cons";
pub const ADP_PROOF_PREFIX: &str = "adp";
pub const STATEMENT_PREFIX: &str = "stmt";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tolerance_value() {
        assert_eq!(CONSERVATION_TOLERANCE.to_string(), "0.001");
    }

    #[test]
    fn test_snarc_thresholds_ordered() {
        assert!(SNARC_RETAIN_THRESHOLD < SNARC_PROMOTE_THRESHOLD);
        assert!(ATP_COST_LEAF < DEFAULT_SIGNIFICANCE_THRESHOLD);
        assert!(ATP_COST_STEM > DEFAULT_SIGNIFICANCE_THRESHOLD);
    }
}
