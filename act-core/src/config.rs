//! Ledger configuration
//!
//! Defaults match the reference five-node deployment. Every field can be
//! overridden from `ACT_*` environment variables.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::env;

use crate::consensus::ForkTieBreak;
use crate::constants::{
    DEFAULT_COMPOST_CAPACITY, DEFAULT_CONSENSUS_NODES, DEFAULT_CONSENSUS_THRESHOLD,
    DEFAULT_SIGNIFICANCE_THRESHOLD, DEV_CONSENSUS_THRESHOLD,
};
use crate::error::ConfigError;
use crate::logging::LogLevel;

/// Environment variable names
pub mod env_keys {
    pub const CONSENSUS_NODES: &str = "ACT_CONSENSUS_NODES";
    pub const CONSENSUS_THRESHOLD: &str = "ACT_CONSENSUS_THRESHOLD";
    pub const COMPOST_CAPACITY: &str = "ACT_COMPOST_CAPACITY";
    pub const SIGNIFICANCE_THRESHOLD: &str = "ACT_SIGNIFICANCE_THRESHOLD";
    pub const RELEVANCE_SCOPE: &str = "ACT_RELEVANCE_SCOPE";
    pub const FORK_TIE_BREAK: &str = "ACT_FORK_TIE_BREAK";
    pub const LOG_LEVEL: &str = "ACT_LOG_LEVEL";
}

/// Ledger configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Consensus node identities
    #[serde(default = "default_nodes")]
    pub consensus_nodes: Vec<String>,
    /// Accept ratio over all nodes, in (0, 1]
    #[serde(default = "default_threshold")]
    pub consensus_threshold: f64,
    /// Compost ring buffer size
    #[serde(default = "default_compost_capacity")]
    pub compost_capacity: usize,
    /// SNARC significance threshold (ATP)
    #[serde(default = "default_significance_threshold")]
    pub significance_threshold: u64,
    /// Societies and entities considered relevant by SNARC
    #[serde(default)]
    pub relevance_scope: BTreeSet<String>,
    #[serde(default)]
    pub fork_tie_break: ForkTieBreak,
    #[serde(default)]
    pub log_level: LogLevel,
}

fn default_nodes() -> Vec<String> {
    DEFAULT_CONSENSUS_NODES.iter().map(|s| s.to_string()).collect()
}

fn default_threshold() -> f64 {
    DEFAULT_CONSENSUS_THRESHOLD
}

fn default_compost_capacity() -> usize {
    DEFAULT_COMPOST_CAPACITY
}

fn default_significance_threshold() -> u64 {
    DEFAULT_SIGNIFICANCE_THRESHOLD
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            consensus_nodes: default_nodes(),
            consensus_threshold: default_threshold(),
            compost_capacity: default_compost_capacity(),
            significance_threshold: default_significance_threshold(),
            relevance_scope: BTreeSet::new(),
            fork_tie_break: ForkTieBreak::default(),
            log_level: LogLevel::default(),
        }
    }
}

impl LedgerConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create configuration from any key lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            consensus_nodes: lookup(env_keys::CONSENSUS_NODES)
                .map(|s| split_list(&s))
                .filter(|nodes| !nodes.is_empty())
                .unwrap_or(defaults.consensus_nodes),
            consensus_threshold: lookup(env_keys::CONSENSUS_THRESHOLD)
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(defaults.consensus_threshold),
            compost_capacity: lookup(env_keys::COMPOST_CAPACITY)
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(defaults.compost_capacity),
            significance_threshold: lookup(env_keys::SIGNIFICANCE_THRESHOLD)
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(defaults.significance_threshold),
            relevance_scope: lookup(env_keys::RELEVANCE_SCOPE)
                .map(|s| split_list(&s).into_iter().collect())
                .unwrap_or(defaults.relevance_scope),
            fork_tie_break: lookup(env_keys::FORK_TIE_BREAK)
                .and_then(|s| ForkTieBreak::parse(&s))
                .unwrap_or(defaults.fork_tie_break),
            log_level: lookup(env_keys::LOG_LEVEL)
                .and_then(|s| LogLevel::parse(&s))
                .unwrap_or(defaults.log_level),
        }
    }

    /// Development configuration (threshold 0.6, debug logging)
    pub fn development() -> Self {
        Self {
            consensus_threshold: DEV_CONSENSUS_THRESHOLD,
            log_level: LogLevel::Debug,
            ..Default::default()
        }
    }

    pub fn with_nodes<I, S>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.consensus_nodes = nodes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.consensus_threshold = threshold;
        self
    }

    pub fn with_relevance_scope<I, S>(mut self, scope: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relevance_scope = scope.into_iter().map(Into::into).collect();
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.consensus_nodes.is_empty() {
            return Err(ConfigError::NoConsensusNodes);
        }
        let mut seen = HashSet::new();
        for node in &self.consensus_nodes {
            if node.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: env_keys::CONSENSUS_NODES.to_string(),
                    value: node.clone(),
                });
            }
            if !seen.insert(node.as_str()) {
                return Err(ConfigError::DuplicateNode(node.clone()));
            }
        }
        if !(self.consensus_threshold > 0.0 && self.consensus_threshold <= 1.0) {
            return Err(ConfigError::InvalidThreshold(self.consensus_threshold));
        }
        if self.compost_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(())
    }
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}
