//! Simulate Command
//!
//! Arguments for the settlement simulation.

use clap::Args;

/// Simulation arguments
#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    /// Number of bilateral settlements to anchor
    #[arg(short, long, default_value = "10")]
    pub settlements: usize,

    /// Settlements per sealed block
    #[arg(short, long, default_value = "5")]
    pub block_size: usize,

    /// Replay an earlier transfer id on every Nth settlement
    #[arg(short, long)]
    pub double_spend_every: Option<usize>,

    /// Total ATP held across all simulated societies
    #[arg(long, default_value = "10000")]
    pub total_atp: i64,
}

impl Default for SimulateArgs {
    fn default() -> Self {
        Self {
            settlements: 10,
            block_size: 5,
            double_spend_every: None,
            total_atp: 10_000,
        }
    }
}
