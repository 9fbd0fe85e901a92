//! Config Commands
//!
//! Commands for inspecting the ledger configuration.

use clap::Subcommand;

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,

    /// Validate the effective configuration
    Validate,

    /// List the environment variables the ledger reads
    Env,
}

/// Environment variables with their meaning
pub fn env_help() -> Vec<(&'static str, &'static str)> {
    use act_core::config::env_keys;

    vec![
        (env_keys::CONSENSUS_NODES, "comma separated consensus node ids"),
        (env_keys::CONSENSUS_THRESHOLD, "accept ratio over all nodes, in (0, 1]"),
        (env_keys::COMPOST_CAPACITY, "compost ring buffer size"),
        (env_keys::SIGNIFICANCE_THRESHOLD, "ATP cost above which an entry is significant"),
        (env_keys::RELEVANCE_SCOPE, "comma separated societies/entities in scope"),
        (env_keys::FORK_TIE_BREAK, "earliest_timestamp, lowest_entry_id or manual"),
        (env_keys::LOG_LEVEL, "error, warn, info, debug or trace"),
    ]
}
