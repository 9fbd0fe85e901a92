//! CLI Error Types
//!
//! Error types for the ACT CLI application.

use act_core::{ConfigError, LedgerError};
use thiserror::Error;

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Invalid argument
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Ledger operation failed
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Chain or entry failed verification
    #[error("Integrity check failed: {message}")]
    Integrity { message: String },
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

impl CliError {
    /// Create an invalid argument error
    pub fn invalid_arg(message: impl Into<String>) -> Self {
        CliError::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create an integrity error
    pub fn integrity(message: impl Into<String>) -> Self {
        CliError::Integrity {
            message: message.into(),
        }
    }

    /// Get exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => 1,
            CliError::InvalidArgument { .. } => 2,
            CliError::Ledger(e) if e.is_not_found() => 21,
            CliError::Ledger(e) if e.is_conflict() => 22,
            CliError::Ledger(e) if e.is_integrity() => 11,
            CliError::Ledger(_) => 10,
            CliError::Integrity { .. } => 11,
        }
    }
}
