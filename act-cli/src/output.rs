//! Output Formatting
//!
//! Utilities for formatting CLI output in various formats.

use act_core::LedgerConfig;
use serde::Serialize;

use crate::commands::OutputFormat;
use crate::handler::{DemoReport, SimulationReport};

/// Format and print data based on output format
pub fn print_output<T: Serialize>(data: &T, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(data),
        OutputFormat::Table | OutputFormat::Plain => print_plain(data),
    }
}

/// Print as JSON
fn print_json<T: Serialize>(data: &T) {
    match serde_json::to_string_pretty(data) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error formatting JSON: {}", e),
    }
}

/// Print as compact JSON
fn print_plain<T: Serialize>(data: &T) {
    match serde_json::to_string(data) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error formatting JSON: {}", e),
    }
}

/// Print the guided demo report
pub fn print_demo(report: &DemoReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Plain => {
            for step in &report.steps {
                println!("{}: {}", step.step, step.outcome);
            }
        }
        OutputFormat::Table => {
            println!("ACT Ledger Demo");
            println!("================");
            for step in &report.steps {
                print_row(&step.step, &step.outcome);
            }
            println!();
            println!("Chain");
            print_separator();
            print_row("Valid", validity(report.chain.valid));
            print_row("Blocks", &report.chain.blocks.to_string());
            print_row("Entries", &report.chain.entries.to_string());
            print_row("Latest Hash", &report.chain.latest_hash.to_hex());
            println!();
            println!("Tiers");
            print_separator();
            print_row("Compost", &report.fractal.compost.to_string());
            print_row("Leaf", &report.fractal.leaf.to_string());
            print_row("Stem", &report.fractal.stem.to_string());
            print_row("Root", &report.fractal.root.to_string());
            print_row("Promotions", &report.fractal.promotions.to_string());
            print_row("ATP Cost", &report.fractal.total_atp_cost.to_string());
            println!();
            println!("Settlements");
            print_separator();
            print_row("Settled", &report.settlement.settlements.to_string());
            print_row(
                "Conservation",
                &report.settlement.conservation_proofs.to_string(),
            );
            print_row("ADP Proofs", &report.settlement.adp_proofs.to_string());
            print_row(
                "Double-Spends",
                &report.settlement.double_spend_alerts.to_string(),
            );
        }
    }
}

/// Print the simulation report
pub fn print_simulation(report: &SimulationReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Plain => print_plain(report),
        OutputFormat::Table => {
            println!("Settlement Simulation");
            println!("======================");
            print_row("Requested", &report.settlements_requested.to_string());
            print_row("Anchored", &report.settlements_anchored.to_string());
            print_row("Double-Spends", &report.double_spends.to_string());
            print_row("Verified", &report.verified_settlements.to_string());
            print_separator();
            print_row("Blocks", &report.blocks.to_string());
            print_row("Entries", &report.entries.to_string());
            print_row("ATP Cost", &report.total_atp_cost.to_string());
            print_row("Chain", validity(report.chain_valid));
            print_row("Merkle Roots", validity(report.merkle_roots_valid));
            print_row("Conservation", validity(report.conserved));
            print_row("Latest Hash", &report.latest_hash);
        }
    }
}

/// Print the effective configuration
pub fn print_config(config: &LedgerConfig, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(config),
        OutputFormat::Plain => print_plain(config),
        OutputFormat::Table => {
            println!("Ledger Configuration");
            println!("=====================");
            print_row("Nodes", &config.consensus_nodes.join(", "));
            print_row("Threshold", &config.consensus_threshold.to_string());
            print_row("Compost Capacity", &config.compost_capacity.to_string());
            print_row(
                "Significance",
                &config.significance_threshold.to_string(),
            );
            let scope: Vec<&str> = config.relevance_scope.iter().map(String::as_str).collect();
            print_row("Relevance Scope", &scope.join(", "));
            print_row("Fork Tie-Break", &format!("{:?}", config.fork_tie_break));
            print_row("Log Level", config.log_level.as_str());
        }
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("{}", message);
}

fn validity(ok: bool) -> &'static str {
    if ok {
        "VALID"
    } else {
        "INVALID"
    }
}

/// Print a table row
pub fn print_row(key: &str, value: &str) {
    println!("{:<20} {}", key, value);
}

/// Print a separator line
pub fn print_separator() {
    println!("{}", "-".repeat(40));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity() {
        assert_eq!(validity(true), "VALID");
        assert_eq!(validity(false), "INVALID");
    }

    #[test]
    fn test_print_config_formats() {
        let config = LedgerConfig::default();
        print_config(&config, OutputFormat::Table);
        print_config(&config, OutputFormat::Json);
    }
}
