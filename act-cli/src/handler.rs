//! Command Handlers
//!
//! Handler functions for CLI commands. Every command runs against a fresh
//! in-process ledger built from the effective configuration.

use act_core::{
    BilateralStatement, ChainProof, ContentPayload, EntryContent, EntryId, EntryType,
    FractalStats, LedgerConfig, LedgerError, SettlementStats, SharedLedger, WitnessId,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::commands::{config::ConfigCommands, simulate::SimulateArgs, Cli, Commands, OutputFormat};
use crate::error::{CliError, CliResult};
use crate::output;

/// Societies used by the simulation, paired round-robin
const SIM_SOCIETIES: [&str; 4] = ["soc:amber", "soc:cobalt", "soc:jade", "soc:umber"];

/// One step of the guided demo
#[derive(Debug, Clone, Serialize)]
pub struct DemoStep {
    pub step: String,
    pub outcome: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DemoReport {
    pub steps: Vec<DemoStep>,
    pub chain: ChainProof,
    pub fractal: FractalStats,
    pub settlement: SettlementStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub settlements_requested: usize,
    pub settlements_anchored: usize,
    pub double_spends: usize,
    pub verified_settlements: usize,
    pub blocks: usize,
    pub entries: usize,
    pub total_atp_cost: u64,
    pub chain_valid: bool,
    pub merkle_roots_valid: bool,
    pub conserved: bool,
    pub latest_hash: String,
}

/// Run the CLI with parsed arguments
pub async fn run(cli: Cli) -> CliResult<()> {
    match &cli.command {
        Commands::Config(cmd) => handle_config(&cli, cmd),
        Commands::Demo => {
            let ledger = SharedLedger::from_config(&resolve_config(&cli)?)?;
            let report = run_demo(&ledger).await?;
            output::print_demo(&report, cli.format);
            Ok(())
        }
        Commands::Simulate(args) => {
            let ledger = SharedLedger::from_config(&resolve_config(&cli)?)?;
            let report = run_simulation(&ledger, args).await?;
            output::print_simulation(&report, cli.format);
            if !report.chain_valid {
                return Err(CliError::integrity("block hash chain is broken"));
            }
            Ok(())
        }
    }
}

/// Environment configuration with command line overrides applied
pub fn effective_config(cli: &Cli) -> LedgerConfig {
    let mut config = LedgerConfig::from_env();
    if let Some(nodes) = &cli.nodes {
        config = config.with_nodes(nodes.iter().cloned());
    }
    if let Some(threshold) = cli.threshold {
        config = config.with_threshold(threshold);
    }
    config
}

/// [`effective_config`], validated
pub fn resolve_config(cli: &Cli) -> CliResult<LedgerConfig> {
    let config = effective_config(cli);
    config.validate()?;
    Ok(config)
}

fn handle_config(cli: &Cli, cmd: &ConfigCommands) -> CliResult<()> {
    match cmd {
        ConfigCommands::Show => {
            output::print_config(&effective_config(cli), cli.format);
            Ok(())
        }
        ConfigCommands::Validate => {
            let config = resolve_config(cli)?;
            output::print_success(&format!(
                "Configuration valid: {} nodes, threshold {}",
                config.consensus_nodes.len(),
                config.consensus_threshold
            ));
            Ok(())
        }
        ConfigCommands::Env => {
            let vars = crate::commands::config::env_help();
            match cli.format {
                OutputFormat::Json => {
                    let map: BTreeMap<_, _> = vars.into_iter().collect();
                    output::print_output(&map, cli.format);
                }
                OutputFormat::Table | OutputFormat::Plain => {
                    for (key, meaning) in vars {
                        output::print_row(key, meaning);
                    }
                }
            }
            Ok(())
        }
    }
}

/// Vote with nodes in order until the entry is accepted
///
/// Returns the number of votes cast.
async fn collect_votes(ledger: &SharedLedger, entry_id: &EntryId) -> CliResult<usize> {
    let nodes: Vec<WitnessId> = ledger.read(|s| s.engine.nodes().to_vec()).await;
    for (cast, node) in nodes.iter().enumerate() {
        if ledger.vote_and_finalize(entry_id, node, true).await? {
            debug!(entry_id = %entry_id, votes = cast + 1, "Entry accepted");
            return Ok(cast + 1);
        }
    }
    Err(CliError::integrity(format!(
        "entry {} cannot reach consensus with {} nodes",
        entry_id,
        nodes.len()
    )))
}

/// Guided walk through the ledger's main flows
pub async fn run_demo(ledger: &SharedLedger) -> CliResult<DemoReport> {
    let mut steps = Vec::new();
    let mut step = |name: &str, outcome: String| {
        info!(step = name, outcome = %outcome, "Demo step");
        steps.push(DemoStep {
            step: name.to_string(),
            outcome,
        });
    };

    // Settlement through consensus
    let statement = BilateralStatement::new("soc:alpha", "soc:beta")?
        .with_balances(Decimal::new(900, 0), Decimal::new(1100, 0))
        .with_net_position(Decimal::new(-200, 0))
        .with_transfer_ids(["demo-tx-1", "demo-tx-2"]);
    let settlement_id = statement.statement_id.clone();
    let entry = ledger.anchor_settlement(statement).await?;
    step("anchor settlement", format!("proposed {}", entry.entry_id));

    let votes = collect_votes(ledger, &entry.entry_id).await?;
    let block = ledger
        .seal_block()
        .await
        .ok_or_else(|| CliError::integrity("no accepted entries to seal"))?;
    step(
        "consensus",
        format!("accepted after {} votes, sealed block {}", votes, block.height),
    );

    let record = ledger
        .finalize_settlement(&entry.entry_id)
        .await?
        .ok_or_else(|| CliError::integrity("sealed settlement is not finalized"))?;
    let verification = ledger.verify_settlement(&record.settlement_id).await;
    step(
        "verify settlement",
        format!("{} verified={}", settlement_id, verification.verified),
    );

    // Replay of a settled transfer
    let replay = BilateralStatement::new("soc:beta", "soc:gamma")?.with_transfer_ids(["demo-tx-2"]);
    match ledger.anchor_settlement(replay).await {
        Err(LedgerError::DoubleSpend {
            transfer_id,
            alert_entry_id,
        }) => step(
            "double-spend",
            format!("{} rejected, alert {}", transfer_id, alert_entry_id),
        ),
        Err(e) => return Err(e.into()),
        Ok(entry) => {
            return Err(CliError::integrity(format!(
                "replayed transfer was anchored as {}",
                entry.entry_id
            )))
        }
    }

    // Conservation checks
    let mut balances = BTreeMap::new();
    balances.insert("soc:alpha".to_string(), Decimal::new(900, 0));
    balances.insert("soc:beta".to_string(), Decimal::new(1100, 0));
    let expected = Decimal::new(2000, 0);
    let conserved = ledger
        .write(|s| {
            s.settlement
                .anchor_conservation_proof(&mut s.engine, balances.clone(), expected)
        })
        .await?;
    let attached = ledger
        .write(|s| {
            s.settlement
                .attach_conservation_proof(&settlement_id, &conserved.proof_id)
        })
        .await?;
    step(
        "conservation",
        format!("drift {} conserved={} attached={}", conserved.drift, conserved.conserved, attached),
    );

    balances.insert("soc:beta".to_string(), Decimal::new(1050, 0));
    let drifted = ledger
        .write(|s| {
            s.settlement
                .anchor_conservation_proof(&mut s.engine, balances, expected)
        })
        .await?;
    step(
        "conservation drift",
        format!("drift {} conserved={}", drifted.drift, drifted.conserved),
    );

    // ADP discharge
    let adp = ledger
        .write(|s| {
            s.settlement.anchor_adp_discharge(
                &mut s.engine,
                "grant:demo",
                Decimal::new(40, 0),
                Decimal::new(60, 0),
                "sha256:demo-evidence",
            )
        })
        .await?;
    step("adp discharge", format!("{} anchored at stem", adp.adp_id));

    // Lifecycle tiers
    let credential = || {
        EntryContent::new(ContentPayload::CredentialIssuance {
            entity_id: "lct:demo".into(),
            issuer_id: "soc:alpha".into(),
            credential_type: "membership".into(),
        })
        .map(|c| c.with_subtype("membership"))
    };
    let first = ledger.ingest(EntryType::CredentialIssuance, credential()?).await?;
    let second = ledger.ingest(EntryType::CredentialIssuance, credential()?).await?;
    step(
        "snarc novelty",
        format!("first -> {}, repeat -> {}", first.chain_level, second.chain_level),
    );

    let tiered = BilateralStatement::new("soc:gamma", "soc:delta")?.with_transfer_ids(["demo-tx-3"]);
    let stem = ledger
        .ingest(
            EntryType::BilateralSettlement,
            EntryContent::new(ContentPayload::BilateralSettlement(tiered))?,
        )
        .await?;
    match ledger.promote_to_root(&stem.entry_id).await? {
        Some(root) => {
            collect_votes(ledger, &root.entry_id).await?;
            let block = ledger
                .seal_block()
                .await
                .ok_or_else(|| CliError::integrity("promoted entry was not sealed"))?;
            step(
                "promote to root",
                format!("{} sealed in block {}", root.entry_id, block.height),
            );
        }
        None => step(
            "promote to root",
            format!("{} stayed at {}", stem.entry_id, stem.chain_level),
        ),
    }

    let chain = ledger.get_chain_proof().await;
    chain.ensure_valid()?;

    Ok(DemoReport {
        steps,
        chain,
        fractal: ledger.fractal_stats().await,
        settlement: ledger.settlement_stats().await,
    })
}

/// Anchor, vote and seal a batch of synthetic settlements
pub async fn run_simulation(
    ledger: &SharedLedger,
    args: &SimulateArgs,
) -> CliResult<SimulationReport> {
    if args.block_size == 0 {
        return Err(CliError::invalid_arg("block size must be positive"));
    }
    if args.double_spend_every == Some(0) {
        return Err(CliError::invalid_arg("double-spend interval must be positive"));
    }
    if args.total_atp < 0 {
        return Err(CliError::invalid_arg("total ATP must not be negative"));
    }

    let mut anchored = Vec::new();
    let mut double_spends = 0;
    let mut accepted_since_seal = 0;

    for i in 0..args.settlements {
        let replay = args
            .double_spend_every
            .is_some_and(|every| i > 0 && i % every == 0);
        let transfer_id = if replay {
            format!("sim-tx-{}", i - 1)
        } else {
            format!("sim-tx-{}", i)
        };

        let society_a = SIM_SOCIETIES[i % SIM_SOCIETIES.len()];
        let society_b = SIM_SOCIETIES[(i + 1) % SIM_SOCIETIES.len()];
        let statement = BilateralStatement::new(society_a, society_b)?
            .with_net_position(Decimal::new(i as i64 + 1, 0))
            .with_transfer_ids([transfer_id]);

        let entry = match ledger.anchor_settlement(statement).await {
            Ok(entry) => entry,
            Err(LedgerError::DoubleSpend { .. }) => {
                double_spends += 1;
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        collect_votes(ledger, &entry.entry_id).await?;
        anchored.push(entry.entry_id);
        accepted_since_seal += 1;
        if accepted_since_seal == args.block_size {
            ledger.seal_block().await;
            accepted_since_seal = 0;
        }
    }
    ledger.seal_block().await;

    let mut verified_settlements = 0;
    for entry_id in &anchored {
        if let Some(record) = ledger.finalize_settlement(entry_id).await? {
            if ledger.verify_settlement(&record.settlement_id).await.verified {
                verified_settlements += 1;
            }
        }
    }

    let share = Decimal::new(args.total_atp, 0) / Decimal::from(SIM_SOCIETIES.len() as u64);
    let balances: BTreeMap<String, Decimal> = SIM_SOCIETIES
        .iter()
        .map(|s| (s.to_string(), share))
        .collect();
    let conservation = ledger
        .write(|s| {
            s.settlement.anchor_conservation_proof(
                &mut s.engine,
                balances,
                Decimal::new(args.total_atp, 0),
            )
        })
        .await?;

    let chain = ledger.get_chain_proof().await;
    info!(
        anchored = anchored.len(),
        double_spends,
        blocks = chain.blocks,
        "Simulation complete"
    );

    Ok(SimulationReport {
        settlements_requested: args.settlements,
        settlements_anchored: anchored.len(),
        double_spends,
        verified_settlements,
        blocks: chain.blocks,
        entries: chain.entries,
        total_atp_cost: chain.total_atp_cost,
        chain_valid: chain.valid,
        merkle_roots_valid: chain.merkle_roots_valid,
        conserved: conservation.conserved,
        latest_hash: chain.latest_hash.to_hex(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> SharedLedger {
        SharedLedger::from_config(&LedgerConfig::development()).unwrap()
    }

    #[tokio::test]
    async fn test_demo_runs() {
        let report = run_demo(&ledger()).await.unwrap();

        assert!(report.chain.valid);
        assert_eq!(report.chain.blocks, 2);
        assert_eq!(report.settlement.double_spend_alerts, 1);
        assert_eq!(report.settlement.conservation_proofs, 2);
        assert_eq!(report.settlement.adp_proofs, 1);
        assert_eq!(report.fractal.promotions, 3);
        assert!(report.steps.iter().any(|s| s.step == "double-spend"));
    }

    #[tokio::test]
    async fn test_simulation_with_replays() {
        let args = SimulateArgs {
            settlements: 10,
            block_size: 3,
            double_spend_every: Some(4),
            total_atp: 1000,
        };
        let report = run_simulation(&ledger(), &args).await.unwrap();

        // i = 4 and i = 8 replay the previous transfer
        assert_eq!(report.double_spends, 2);
        assert_eq!(report.settlements_anchored, 8);
        assert_eq!(report.verified_settlements, 8);
        assert_eq!(report.entries, 8);
        assert_eq!(report.blocks, 3);
        assert!(report.chain_valid);
        assert!(report.conserved);
    }

    #[tokio::test]
    async fn test_simulation_rejects_bad_args() {
        let args = SimulateArgs {
            block_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            run_simulation(&ledger(), &args).await,
            Err(CliError::InvalidArgument { .. })
        ));
    }

    #[tokio::test]
    async fn test_unreachable_consensus_is_reported() {
        let config = LedgerConfig::development().with_nodes(["solo"]);
        let ledger = SharedLedger::from_config(&config).unwrap();
        let args = SimulateArgs {
            settlements: 1,
            ..Default::default()
        };
        assert!(matches!(
            run_simulation(&ledger, &args).await,
            Err(CliError::Integrity { .. })
        ));
    }
}
