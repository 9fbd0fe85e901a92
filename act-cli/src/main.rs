//! ACT CLI Entry Point
//!
//! Configuration is loaded from environment variables (via .env file).
//! Command-line arguments override environment variables.
//!
//! Usage:
//!   act demo          - Guided walk through the ledger flows
//!   act simulate      - Anchor and seal synthetic settlements
//!   act config        - Inspect configuration

use act_core::{logging::LogLevel, LedgerConfig};
use act_cli::{handler, Cli};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load .env file (ignore if not found)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let level = if cli.verbose {
        LogLevel::Debug
    } else {
        LedgerConfig::from_env().log_level
    };
    init_logging(level);

    if let Err(e) = handler::run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

/// Initialize logging with tracing; `RUST_LOG` takes precedence
fn init_logging(level: LogLevel) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("act_cli={level},act_core={level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
