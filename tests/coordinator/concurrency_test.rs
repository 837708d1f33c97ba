// Concurrency Tests
// Many threads voting against one shared coordinator

use ballotchain::chain::ChainVerifier;
use ballotchain::config::BallotConfig;
use ballotchain::coordinator::{RejectReason, VoteCoordinator, VoteOutcome, VoteRequest};
use ballotchain::registry::PasscodeParams;
use ballotchain::storage::BallotStore;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;

fn shared_coordinator(path: &Path, voters: usize) -> Arc<VoteCoordinator> {
    let config = BallotConfig::new()
        .with_db_path(path)
        .with_max_append_retries(100)
        .with_retry_backoff_ms(1)
        .with_flush_on_commit(false)
        .with_passcode_params(PasscodeParams {
            memory_kib: 64,
            iterations: 1,
        });
    let coordinator = VoteCoordinator::new(BallotStore::open(path).unwrap(), &config);

    coordinator
        .ledger()
        .initialize("2024-01-01T00:00:00".to_string())
        .unwrap();
    for i in 0..voters {
        coordinator
            .registry()
            .register(&format!("voter{}", i), "pass")
            .unwrap();
    }
    coordinator
        .roster()
        .seed(&["Cleopatra".to_string(), "Abraham Lincoln".to_string()])
        .unwrap();
    Arc::new(coordinator)
}

fn run_concurrently(
    coordinator: &Arc<VoteCoordinator>,
    requests: Vec<VoteRequest>,
) -> Vec<VoteOutcome> {
    let barrier = Arc::new(Barrier::new(requests.len()));
    let handles: Vec<_> = requests
        .into_iter()
        .map(|request| {
            let coordinator = Arc::clone(coordinator);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                coordinator.cast_vote(&request).unwrap()
            })
        })
        .collect();

    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

// ============================================================================
// SAME VOTER
// ============================================================================

#[test]
fn test_same_voter_commits_exactly_once() {
    let temp_dir = TempDir::new().unwrap();
    let coordinator = shared_coordinator(temp_dir.path(), 1);

    let requests = (0..8)
        .map(|i| {
            let candidate = if i % 2 == 0 { "Cleopatra" } else { "Abraham Lincoln" };
            VoteRequest::new("voter0", "pass", candidate)
        })
        .collect();
    let outcomes = run_concurrently(&coordinator, requests);

    let committed = outcomes.iter().filter(|o| o.is_committed()).count();
    assert_eq!(committed, 1);
    for outcome in outcomes.iter().filter(|o| !o.is_committed()) {
        assert_eq!(outcome.reject_reason(), Some(RejectReason::AlreadyVoted));
    }

    let chain = coordinator.ledger().all().unwrap();
    assert_eq!(chain.len(), 2);
    assert!(ChainVerifier::verify(&chain).is_ok());
}

// ============================================================================
// DISTINCT VOTERS
// ============================================================================

#[test]
fn test_distinct_voters_all_land_without_forks() {
    let temp_dir = TempDir::new().unwrap();
    let voters = 8;
    let coordinator = shared_coordinator(temp_dir.path(), voters);

    let requests = (0..voters)
        .map(|i| VoteRequest::new(&format!("voter{}", i), "pass", "Cleopatra"))
        .collect();
    let outcomes = run_concurrently(&coordinator, requests);

    assert!(outcomes.iter().all(|o| o.is_committed()));

    let chain = coordinator.ledger().all().unwrap();
    assert_eq!(chain.len(), voters + 1);
    let report = ChainVerifier::verify(&chain).unwrap();
    assert_eq!(report.length, voters as u64 + 1);

    // Every block links to a distinct predecessor
    let links: HashSet<&str> = chain.iter().map(|b| b.previous_hash()).collect();
    assert_eq!(links.len(), chain.len());

    let voted: HashSet<String> = chain
        .iter()
        .skip(1)
        .filter_map(|b| b.payload().ok())
        .filter_map(|p| p.voter().map(str::to_string))
        .collect();
    assert_eq!(voted.len(), voters);
    for voter in coordinator.registry().list().unwrap() {
        assert!(voter.has_voted);
    }
}

#[test]
fn test_concurrent_readers_see_valid_prefix() {
    let temp_dir = TempDir::new().unwrap();
    let voters = 6;
    let coordinator = shared_coordinator(temp_dir.path(), voters);

    let reader = {
        let coordinator = Arc::clone(&coordinator);
        thread::spawn(move || {
            for _ in 0..50 {
                let chain = coordinator.ledger().all().unwrap();
                assert!(ChainVerifier::verify(&chain).is_ok());
            }
        })
    };

    let requests = (0..voters)
        .map(|i| VoteRequest::new(&format!("voter{}", i), "pass", "Abraham Lincoln"))
        .collect();
    run_concurrently(&coordinator, requests);
    reader.join().unwrap();

    assert_eq!(coordinator.ledger().len().unwrap(), voters as u64 + 1);
}
