//! ACT CLI - Command Line Interface
//!
//! This crate provides a command-line driver for an in-process ACT
//! settlement ledger.
//!
//! # Features
//!
//! - Guided demo of settlement, double-spend, conservation and tier flows
//! - Settlement simulation with block sealing and chain verification
//! - Configuration inspection
//!
//! # Usage
//!
//! ```text
//! act [OPTIONS] <COMMAND>
//!
//! Commands:
//!   demo      Walk one settlement, a double-spend, conservation checks and tier promotion
//!   simulate  Anchor and seal a batch of synthetic settlements
//!   config    Configuration management
//!
//! Options:
//!   -n, --nodes <NODES>          Consensus nodes, comma separated
//!   -t, --threshold <THRESHOLD>  Consensus accept ratio in (0, 1]
//!   -f, --format <FORMAT>        Output format (json, table, plain) [default: table]
//!   -v, --verbose                Enable verbose output
//!   -h, --help                   Print help
//!   -V, --version                Print version
//! ```
//!
//! # Examples
//!
//! ## Simulate with replayed transfers
//! ```text
//! act simulate --settlements 20 --block-size 5 --double-spend-every 7
//! ```
//!
//! ## Show configuration as JSON
//! ```text
//! act --format json config show
//! ```

pub mod commands;
pub mod error;
pub mod handler;
pub mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use error::{CliError, CliResult};

/// ACT CLI version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
