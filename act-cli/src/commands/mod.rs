//! CLI Commands Module
//!
//! Command definitions for the ACT CLI.

pub mod config;
pub mod simulate;

use clap::{Parser, Subcommand};

/// ACT Settlement Ledger CLI
#[derive(Parser, Debug)]
#[command(name = "act")]
#[command(author = "Rainbow City Foundation")]
#[command(version)]
#[command(about = "ACT Settlement Ledger Command Line Interface")]
#[command(long_about = "A command-line driver for an in-process ACT chain.\n\n\
    Runs a guided demo or a settlement simulation against a fresh ledger and \
    reports consensus, lifecycle and integrity results.")]
pub struct Cli {
    /// Consensus nodes, comma separated (env: ACT_CONSENSUS_NODES)
    #[arg(short, long, env = "ACT_CONSENSUS_NODES", value_delimiter = ',')]
    pub nodes: Option<Vec<String>>,

    /// Consensus accept ratio in (0, 1] (env: ACT_CONSENSUS_THRESHOLD)
    #[arg(short, long, env = "ACT_CONSENSUS_THRESHOLD")]
    pub threshold: Option<f64>,

    /// Output format (json, table, plain)
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Table format (human-readable)
    #[default]
    Table,
    /// Plain text
    Plain,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Walk one settlement, a double-spend, conservation checks and tier promotion
    Demo,

    /// Anchor and seal a batch of synthetic settlements
    Simulate(simulate::SimulateArgs),

    /// Configuration management
    #[command(subcommand)]
    Config(config::ConfigCommands),
}
