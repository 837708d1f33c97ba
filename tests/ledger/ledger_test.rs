// Ledger Tests
// Append-only chain, optimistic tip guard and integrity halts

use ballotchain::chain::{Block, ChainVerifier, IntegrityError, VoteData};
use ballotchain::ledger::{LedgerError, LedgerStore};
use ballotchain::storage::BallotStore;
use std::path::Path;
use tempfile::TempDir;

const T0: &str = "2024-01-01T00:00:00";

fn open_ledger(path: &Path) -> LedgerStore {
    LedgerStore::new(BallotStore::open(path).unwrap())
}

fn next_block(ledger: &LedgerStore, voter: &str, candidate: &str) -> Block {
    let tip = ledger.tip().unwrap();
    Block::new(
        tip.index() + 1,
        format!("2024-01-01T00:00:{:02}", tip.index() + 1),
        &VoteData::vote(voter, candidate),
        tip.hash(),
    )
    .unwrap()
}

/// Rewrite a stored block behind the ledger's back
fn overwrite_block(path: &Path, block: &Block) {
    let db = sled::open(path).unwrap();
    let blocks = db.open_tree("blocks").unwrap();
    blocks
        .insert(block.index().to_be_bytes(), block.to_bytes())
        .unwrap();
    db.flush().unwrap();
}

fn forge(block: &Block, candidate: &str) -> Block {
    let voter = block.payload().unwrap().voter().unwrap().to_string();
    Block::from_parts(
        block.index(),
        block.timestamp().to_string(),
        VoteData::vote(&voter, candidate).to_canonical_json().unwrap(),
        block.previous_hash().to_string(),
        block.hash().to_string(),
    )
}

// ============================================================================
// GENESIS
// ============================================================================

#[test]
fn test_uninitialized_ledger() {
    let temp_dir = TempDir::new().unwrap();
    let ledger = open_ledger(temp_dir.path());

    assert!(!ledger.is_initialized().unwrap());
    assert!(ledger.is_empty().unwrap());
    assert!(ledger.all().unwrap().is_empty());
    assert!(matches!(ledger.tip(), Err(LedgerError::NotInitialized)));
}

#[test]
fn test_initialize_creates_genesis_once() {
    let temp_dir = TempDir::new().unwrap();
    let ledger = open_ledger(temp_dir.path());

    let genesis = ledger.initialize(T0.to_string()).unwrap().unwrap();
    assert_eq!(genesis.index(), 0);
    assert_eq!(genesis.previous_hash(), "0");
    assert!(genesis.is_genesis());

    assert!(ledger.initialize(T0.to_string()).unwrap().is_none());
    assert_eq!(ledger.len().unwrap(), 1);
    assert_eq!(ledger.tip().unwrap(), genesis);
}

#[test]
fn test_append_before_genesis_refused() {
    let temp_dir = TempDir::new().unwrap();
    let ledger = open_ledger(temp_dir.path());

    let orphan = Block::new(1, T0.to_string(), &VoteData::vote("amar", "Cleopatra"), "abc").unwrap();
    assert!(matches!(
        ledger.append(orphan, "abc"),
        Err(LedgerError::NotInitialized)
    ));
}

// ============================================================================
// APPEND
// ============================================================================

#[test]
fn test_append_extends_tip() {
    let temp_dir = TempDir::new().unwrap();
    let ledger = open_ledger(temp_dir.path());
    let genesis = ledger.initialize(T0.to_string()).unwrap().unwrap();

    let block = next_block(&ledger, "amar", "Cleopatra");
    let appended = ledger.append(block.clone(), genesis.hash()).unwrap();

    assert_eq!(appended, block);
    assert_eq!(ledger.tip().unwrap(), block);
    assert_eq!(ledger.get(1).unwrap(), Some(block));

    let chain = ledger.all().unwrap();
    assert_eq!(chain.len(), 2);
    assert_eq!(chain[1].previous_hash(), chain[0].hash());
}

#[test]
fn test_stale_tip_conflicts() {
    let temp_dir = TempDir::new().unwrap();
    let ledger = open_ledger(temp_dir.path());
    let genesis = ledger.initialize(T0.to_string()).unwrap().unwrap();

    // Two writers read the same tip
    let first = next_block(&ledger, "amar", "Cleopatra");
    let second = next_block(&ledger, "divya", "Napoleon Bonaparte");

    ledger.append(first.clone(), genesis.hash()).unwrap();
    match ledger.append(second, genesis.hash()) {
        Err(LedgerError::Conflict { expected, actual }) => {
            assert_eq!(expected, genesis.hash());
            assert_eq!(actual, first.hash());
        }
        other => panic!("expected conflict, got {:?}", other),
    }

    assert_eq!(ledger.len().unwrap(), 2);
    assert_eq!(ledger.tip().unwrap(), first);
}

#[test]
fn test_malformed_blocks_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let ledger = open_ledger(temp_dir.path());
    let genesis = ledger.initialize(T0.to_string()).unwrap().unwrap();

    let skipped = Block::new(5, T0.to_string(), &VoteData::vote("amar", "Cleopatra"), genesis.hash())
        .unwrap();
    assert!(matches!(
        ledger.append(skipped, genesis.hash()),
        Err(LedgerError::InvalidBlock(_))
    ));

    let good = next_block(&ledger, "amar", "Cleopatra");
    let bad_hash = Block::from_parts(
        good.index(),
        good.timestamp().to_string(),
        good.vote_data().to_string(),
        good.previous_hash().to_string(),
        "00".repeat(32),
    );
    assert!(matches!(
        ledger.append(bad_hash, genesis.hash()),
        Err(LedgerError::InvalidBlock(_))
    ));

    assert_eq!(ledger.len().unwrap(), 1);
}

#[test]
fn test_chain_persists_across_reopen() {
    let temp_dir = TempDir::new().unwrap();

    let expected = {
        let ledger = open_ledger(temp_dir.path());
        let genesis = ledger.initialize(T0.to_string()).unwrap().unwrap();
        let block = next_block(&ledger, "amar", "Cleopatra");
        ledger.append(block, genesis.hash()).unwrap();
        ledger.all().unwrap()
    };

    let ledger = open_ledger(temp_dir.path());
    assert_eq!(ledger.all().unwrap(), expected);
    assert!(ChainVerifier::verify(&expected).is_ok());
}

// ============================================================================
// INTEGRITY HALT
// ============================================================================

#[test]
fn test_verify_detects_tampering_and_halts() {
    let temp_dir = TempDir::new().unwrap();
    let (original, tip_hash) = {
        let ledger = open_ledger(temp_dir.path());
        let genesis = ledger.initialize(T0.to_string()).unwrap().unwrap();
        let first = ledger
            .append(next_block(&ledger, "amar", "Cleopatra"), genesis.hash())
            .unwrap();
        let second = ledger
            .append(next_block(&ledger, "divya", "Cleopatra"), first.hash())
            .unwrap();
        (first, second.hash().to_string())
    };

    overwrite_block(temp_dir.path(), &forge(&original, "Napoleon Bonaparte"));

    let ledger = open_ledger(temp_dir.path());
    match ledger.verify() {
        Err(LedgerError::ChainCorrupted(IntegrityError::HashMismatch { index, .. })) => {
            assert_eq!(index, 1)
        }
        other => panic!("expected corruption, got {:?}", other),
    }
    assert!(ledger.halt_reason().unwrap().is_some());

    // Appends are refused even though the tip itself is intact
    let block = next_block(&ledger, "nicola", "Cleopatra");
    assert!(matches!(
        ledger.append(block, &tip_hash),
        Err(LedgerError::ChainCorrupted(_))
    ));
    assert_eq!(ledger.len().unwrap(), 3);
}

#[test]
fn test_corrupted_tip_halts_append() {
    let temp_dir = TempDir::new().unwrap();
    let original = {
        let ledger = open_ledger(temp_dir.path());
        let genesis = ledger.initialize(T0.to_string()).unwrap().unwrap();
        ledger
            .append(next_block(&ledger, "amar", "Cleopatra"), genesis.hash())
            .unwrap()
    };

    overwrite_block(temp_dir.path(), &forge(&original, "Winston Churchill"));

    let ledger = open_ledger(temp_dir.path());
    let block = next_block(&ledger, "divya", "Cleopatra");
    assert!(matches!(
        ledger.append(block, original.hash()),
        Err(LedgerError::ChainCorrupted(IntegrityError::HashMismatch { index: 1, .. }))
    ));
    assert!(ledger.halt_reason().unwrap().is_some());
}

#[test]
fn test_reconcile_requires_repair() {
    let temp_dir = TempDir::new().unwrap();
    let original = {
        let ledger = open_ledger(temp_dir.path());
        let genesis = ledger.initialize(T0.to_string()).unwrap().unwrap();
        ledger
            .append(next_block(&ledger, "amar", "Cleopatra"), genesis.hash())
            .unwrap()
    };

    overwrite_block(temp_dir.path(), &forge(&original, "Winston Churchill"));
    {
        let ledger = open_ledger(temp_dir.path());
        assert!(ledger.verify().is_err());
        assert!(matches!(ledger.reconcile(), Err(LedgerError::ChainCorrupted(_))));
        assert!(ledger.halt_reason().unwrap().is_some());
    }

    // Operator restores the original block
    overwrite_block(temp_dir.path(), &original);

    let ledger = open_ledger(temp_dir.path());
    let report = ledger.reconcile().unwrap();
    assert_eq!(report.length, 2);
    assert_eq!(report.tip_hash.as_deref(), Some(original.hash()));
    assert!(ledger.halt_reason().unwrap().is_none());

    let block = next_block(&ledger, "divya", "Cleopatra");
    ledger.append(block, original.hash()).unwrap();
    assert_eq!(ledger.len().unwrap(), 3);
}
