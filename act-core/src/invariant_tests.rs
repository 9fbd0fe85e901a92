//! Chain invariant coverage
//!
//! Every invariant the ledger promises has at least one test here that
//! drives it through the public API.
//!
//! 1. Proposal hash-chain: each entry links to the previous proposal's content hash
//! 2. Block hash-chain: each block links to its predecessor, the first to genesis
//! 3. Acceptance needs both the witness count and the accept ratio
//! 4. A settled transfer id never backs a later settlement
//! 5. SNARC routing: promote => Stem, retain => Leaf, otherwise Compost only
//! 6. A block's Merkle root depends only on its entries' content hashes in order
//! 7. Consensus state never regresses

use rust_decimal::Decimal;

use crate::canon::Canonicalizer;
use crate::config::LedgerConfig;
use crate::consensus::ConsensusEngine;
use crate::constants::GENESIS_SEED;
use crate::crypto::MerkleTree;
use crate::error::LedgerError;
use crate::fractal::FractalChainManager;
use crate::settlement::SettlementService;
use crate::types::{
    BilateralStatement, ChainLevel, ConsensusState, ContentPayload, Digest, EntryContent, EntryId,
    EntryType, WitnessId,
};

const NODES: [&str; 5] = ["w1", "w2", "w3", "w4", "w5"];

fn engine() -> ConsensusEngine {
    ConsensusEngine::new(NODES, 0.6).unwrap()
}

fn settlement(transfers: &[&str]) -> EntryContent {
    let statement = BilateralStatement::new("soc:a", "soc:b")
        .unwrap()
        .with_balances(Decimal::new(500, 0), Decimal::new(500, 0))
        .with_transfer_ids(transfers.iter().copied());
    EntryContent::new(ContentPayload::BilateralSettlement(statement)).unwrap()
}

fn charter() -> EntryContent {
    EntryContent::new(ContentPayload::CharterAmendment {
        society_id: "soc:a".into(),
        amendment: "quorum".into(),
        new_value: "4".into(),
    })
    .unwrap()
}

fn accept_all(engine: &mut ConsensusEngine, entry_id: &EntryId, count: usize) {
    for node in &NODES[..count] {
        engine
            .submit_vote(entry_id, &WitnessId::new(*node), true, None)
            .unwrap();
    }
}

// ========================================================================
// INVARIANT 1: proposal hash-chain
// ========================================================================

#[test]
fn invariant_proposal_chain_links_content_hashes() {
    let mut engine = engine();
    let genesis = Digest::sha256(GENESIS_SEED.as_bytes());

    let first = engine
        .propose(EntryType::BilateralSettlement, settlement(&["t1"]), ChainLevel::Root)
        .unwrap();
    let second = engine
        .propose(EntryType::CharterAmendment, charter(), ChainLevel::Root)
        .unwrap();

    assert_eq!(first.prev_hash, genesis);
    assert_eq!(second.prev_hash, first.content_hash);

    // sealing a block does not restart the chain
    accept_all(&mut engine, &first.entry_id, 3);
    engine.finalize_entry(&first.entry_id).unwrap();
    engine.seal_block().unwrap();
    let third = engine
        .propose(EntryType::BilateralSettlement, settlement(&["t2"]), ChainLevel::Root)
        .unwrap();
    assert_eq!(third.prev_hash, second.content_hash);
}

#[test]
fn invariant_content_hash_recomputes() {
    let mut engine = engine();
    let entry = engine
        .propose(EntryType::BilateralSettlement, settlement(&["t1"]), ChainLevel::Root)
        .unwrap();
    let rehashed = Canonicalizer::new().content_hash(&entry.content).unwrap();
    assert_eq!(rehashed, entry.content_hash);
}

// ========================================================================
// INVARIANT 2: block hash-chain
// ========================================================================

#[test]
fn invariant_blocks_chain_from_genesis() {
    let mut engine = engine();
    for i in 0..3 {
        let entry = engine
            .propose(
                EntryType::BilateralSettlement,
                settlement(&[&format!("t{i}")]),
                ChainLevel::Root,
            )
            .unwrap();
        accept_all(&mut engine, &entry.entry_id, 3);
        engine.finalize_entry(&entry.entry_id).unwrap();
        engine.seal_block().unwrap();
    }

    let blocks = engine.blocks();
    assert_eq!(blocks.len(), 3);
    assert_eq!(blocks[0].prev_block_hash, engine.genesis_hash());
    for pair in blocks.windows(2) {
        assert_eq!(pair[1].prev_block_hash, pair[0].block_hash());
        assert_eq!(pair[1].height, pair[0].height + 1);
    }
    assert!(engine.get_chain_proof().valid);
}

// ========================================================================
// INVARIANT 3: acceptance needs witnesses AND ratio
// ========================================================================

#[test]
fn invariant_ratio_alone_is_not_enough() {
    let mut engine = engine();
    // charter amendments need 5 witnesses
    let entry = engine
        .propose(EntryType::CharterAmendment, charter(), ChainLevel::Root)
        .unwrap();
    accept_all(&mut engine, &entry.entry_id, 4);

    let (has_consensus, ratio) = engine.check_consensus(&entry.entry_id);
    assert!(ratio >= engine.threshold());
    assert!(!has_consensus);
    assert!(!engine.finalize_entry(&entry.entry_id).unwrap());

    engine
        .submit_vote(&entry.entry_id, &WitnessId::new("w5"), true, None)
        .unwrap();
    assert!(engine.finalize_entry(&entry.entry_id).unwrap());
}

#[test]
fn invariant_witnesses_alone_are_not_enough() {
    let mut engine = ConsensusEngine::new(
        ["w1", "w2", "w3", "w4", "w5", "w6", "w7", "w8", "w9", "w10"],
        0.6,
    )
    .unwrap();
    let entry = engine
        .propose(EntryType::BilateralSettlement, settlement(&["t1"]), ChainLevel::Root)
        .unwrap();
    accept_all(&mut engine, &entry.entry_id, 3);

    let (has_consensus, ratio) = engine.check_consensus(&entry.entry_id);
    assert!((ratio - 0.3).abs() < 1e-9);
    assert!(!has_consensus);
}

#[test]
fn invariant_consensus_is_monotonic() {
    let mut engine = engine();
    let entry = engine
        .propose(EntryType::BilateralSettlement, settlement(&["t1"]), ChainLevel::Root)
        .unwrap();

    let mut seen_true = false;
    for (i, node) in NODES.iter().enumerate() {
        // a reject in the middle must not flip an earlier true back
        let accept = i != 3;
        engine
            .submit_vote(&entry.entry_id, &WitnessId::new(*node), accept, None)
            .unwrap();
        let (has_consensus, _) = engine.check_consensus(&entry.entry_id);
        if seen_true {
            assert!(has_consensus);
        }
        seen_true |= has_consensus;
    }
    assert!(seen_true);
}

// ========================================================================
// INVARIANT 4: double-spend is permanent
// ========================================================================

#[test]
fn invariant_settled_transfer_never_resettles() {
    let mut engine = engine();
    let mut svc = SettlementService::new();
    let statement = || {
        BilateralStatement::new("soc:a", "soc:b")
            .unwrap()
            .with_transfer_ids(["t1"])
    };

    let entry = svc.anchor_settlement(&mut engine, statement()).unwrap();
    accept_all(&mut engine, &entry.entry_id, 3);
    engine.finalize_entry(&entry.entry_id).unwrap();
    engine.seal_block().unwrap();

    for _ in 0..3 {
        assert!(matches!(
            svc.anchor_settlement(&mut engine, statement()),
            Err(LedgerError::DoubleSpend { .. })
        ));
        assert!(engine.detect_double_spend("t1"));
    }
    // one alert per rejected attempt
    assert_eq!(svc.double_spend_alerts().len(), 3);
    let settlements = engine
        .pending_entries()
        .iter()
        .filter(|e| e.entry_type == EntryType::BilateralSettlement)
        .count();
    assert_eq!(settlements, 0);
}

// ========================================================================
// INVARIANT 5: SNARC routing
// ========================================================================

#[test]
fn invariant_snarc_routing() {
    let config = LedgerConfig::default().with_relevance_scope(["soc:a"]);
    let mut fractal = FractalChainManager::from_config(&config);

    // novel 3 + consequential 2 + relevant 1 = 6
    let stem = fractal
        .ingest(EntryType::BilateralSettlement, settlement(&["t1"]))
        .unwrap();
    assert_eq!(stem.chain_level, ChainLevel::Stem);

    // consequential 2 + relevant 1 = 3
    let leaf = fractal
        .ingest(EntryType::BilateralSettlement, settlement(&["t2"]))
        .unwrap();
    assert_eq!(leaf.chain_level, ChainLevel::Leaf);

    // novel 3 only
    let audit = EntryContent::new(ContentPayload::AuditSeal {
        scope: "q1".into(),
        sealed_digest: "d".into(),
        entity_id: None,
    })
    .unwrap();
    let leaf2 = fractal.ingest(EntryType::AuditSeal, audit.clone()).unwrap();
    assert_eq!(leaf2.chain_level, ChainLevel::Leaf);

    // nothing
    let compost = fractal.ingest(EntryType::AuditSeal, audit).unwrap();
    assert_eq!(compost.chain_level, ChainLevel::Compost);
    assert_eq!(compost.atp_cost, 0);

    assert_eq!(fractal.stem().len(), 1);
    assert_eq!(fractal.leaf().len(), 2);
}

// ========================================================================
// INVARIANT 6: Merkle root is a pure function of ordered content hashes
// ========================================================================

#[test]
fn invariant_block_root_is_pure() {
    let mut engine = engine();
    let mut hashes = Vec::new();
    for i in 0..3 {
        let entry = engine
            .propose(
                EntryType::BilateralSettlement,
                settlement(&[&format!("t{i}")]),
                ChainLevel::Root,
            )
            .unwrap();
        accept_all(&mut engine, &entry.entry_id, 3);
        engine.finalize_entry(&entry.entry_id).unwrap();
        hashes.push(entry.content_hash);
    }
    let block = engine.seal_block().unwrap();

    assert_eq!(block.merkle_root, MerkleTree::build(&hashes).root());
    assert_eq!(block.merkle_root, block.recompute_merkle_root());

    let mut reversed = hashes.clone();
    reversed.reverse();
    assert_ne!(MerkleTree::build(&reversed).root(), block.merkle_root);
}

// ========================================================================
// INVARIANT 7: states never regress
// ========================================================================

#[test]
fn invariant_states_only_move_forward() {
    let mut engine = engine();
    let entry = engine
        .propose(EntryType::BilateralSettlement, settlement(&["t1"]), ChainLevel::Root)
        .unwrap();
    accept_all(&mut engine, &entry.entry_id, 3);
    engine.finalize_entry(&entry.entry_id).unwrap();
    engine.seal_block().unwrap();

    let sealed = engine.get_entry(&entry.entry_id).unwrap();
    assert_eq!(sealed.consensus_state, ConsensusState::Finalized);

    // Finalized entries cannot be rejected or voted on
    assert!(matches!(
        engine.reject_entry(&entry.entry_id),
        Err(LedgerError::InvalidState(_))
    ));
    assert!(matches!(
        engine.submit_vote(&entry.entry_id, &WitnessId::new("w4"), false, None),
        Err(LedgerError::InvalidState(_))
    ));
    assert!(engine.finalize_entry(&entry.entry_id).unwrap());
    assert_eq!(
        engine.get_entry(&entry.entry_id).unwrap().consensus_state,
        ConsensusState::Finalized
    );
}
