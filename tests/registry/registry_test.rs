// Registry Tests
// Voter authentication, registration and the candidate roster

use ballotchain::registry::{
    AuthResult, CandidateRoster, PasscodeHash, PasscodeParams, RegistryError, VoterRegistry,
};
use ballotchain::storage::BallotStore;
use tempfile::TempDir;

fn fast_params() -> PasscodeParams {
    PasscodeParams {
        memory_kib: 64,
        iterations: 1,
    }
}

fn open_registry(dir: &TempDir) -> (BallotStore, VoterRegistry) {
    let store = BallotStore::open(dir.path()).unwrap();
    let registry = VoterRegistry::new(store.clone(), fast_params());
    (store, registry)
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|name| name.to_string()).collect()
}

// ============================================================================
// PASSCODES
// ============================================================================

#[test]
fn test_passcode_hashes_are_salted() {
    let a = PasscodeHash::new("1234", fast_params()).unwrap();
    let b = PasscodeHash::new("1234", fast_params()).unwrap();
    assert_ne!(postcard::to_allocvec(&a).unwrap(), postcard::to_allocvec(&b).unwrap());
}

#[test]
fn test_passcode_hash_debug_redacted() {
    let hash = PasscodeHash::new("1234", fast_params()).unwrap();
    let printed = format!("{:?}", hash);
    assert!(!printed.contains("1234"));
}

#[test]
fn test_invalid_params_rejected() {
    let params = PasscodeParams {
        memory_kib: 1,
        iterations: 0,
    };
    assert!(params.validate().is_err());
}

// ============================================================================
// AUTHENTICATION
// ============================================================================

#[test]
fn test_authenticate_outcomes() {
    let temp_dir = TempDir::new().unwrap();
    let (_store, registry) = open_registry(&temp_dir);

    assert!(registry.register("amar", "9894").unwrap());

    assert_eq!(registry.authenticate("amar", "9894").unwrap(), AuthResult::Ok);
    assert_eq!(
        registry.authenticate("amar", "0000").unwrap(),
        AuthResult::WrongPasscode
    );
    assert_eq!(
        registry.authenticate("ghost", "9894").unwrap(),
        AuthResult::NotFound
    );
}

#[test]
fn test_register_never_overwrites() {
    let temp_dir = TempDir::new().unwrap();
    let (_store, registry) = open_registry(&temp_dir);

    assert!(registry.register("divya", "3456").unwrap());
    assert!(!registry.register("divya", "changed").unwrap());

    assert_eq!(registry.authenticate("divya", "3456").unwrap(), AuthResult::Ok);
    assert_eq!(
        registry.authenticate("divya", "changed").unwrap(),
        AuthResult::WrongPasscode
    );
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_register_empty_usercode() {
    let temp_dir = TempDir::new().unwrap();
    let (_store, registry) = open_registry(&temp_dir);

    assert!(matches!(
        registry.register("", "1234"),
        Err(RegistryError::EmptyUsercode)
    ));
}

#[test]
fn test_status_and_list() {
    let temp_dir = TempDir::new().unwrap();
    let (_store, registry) = open_registry(&temp_dir);

    registry.register("nicola", "6969").unwrap();
    registry.register("amar", "9894").unwrap();

    let status = registry.status("amar").unwrap().unwrap();
    assert_eq!(status.usercode, "amar");
    assert!(!status.has_voted);
    assert!(registry.status("ghost").unwrap().is_none());

    let usercodes: Vec<String> = registry
        .list()
        .unwrap()
        .into_iter()
        .map(|voter| voter.usercode)
        .collect();
    assert_eq!(usercodes, names(&["amar", "nicola"]));
}

#[test]
fn test_params_stored_per_voter() {
    let temp_dir = TempDir::new().unwrap();
    let store = BallotStore::open(temp_dir.path()).unwrap();

    VoterRegistry::new(store.clone(), fast_params())
        .register("reshma", "1234")
        .unwrap();

    // A registry configured with different costs still verifies old digests
    let stronger = PasscodeParams {
        memory_kib: 128,
        iterations: 2,
    };
    let registry = VoterRegistry::new(store, stronger);
    assert_eq!(registry.authenticate("reshma", "1234").unwrap(), AuthResult::Ok);
}

// ============================================================================
// CANDIDATES
// ============================================================================

#[test]
fn test_roster_lexicographic() {
    let temp_dir = TempDir::new().unwrap();
    let store = BallotStore::open(temp_dir.path()).unwrap();
    let roster = CandidateRoster::new(store);

    let inserted = roster
        .seed(&names(&["Winston Churchill", "Cleopatra", "Abraham Lincoln"]))
        .unwrap();
    assert_eq!(inserted, 3);

    assert_eq!(
        roster.names().unwrap(),
        names(&["Abraham Lincoln", "Cleopatra", "Winston Churchill"])
    );

    // Ids follow the configured order
    let list = roster.list().unwrap();
    assert_eq!(list[0].id, 3);
    assert_eq!(list[1].id, 2);
    assert_eq!(list[2].id, 1);
}

#[test]
fn test_roster_seeded_once() {
    let temp_dir = TempDir::new().unwrap();
    let store = BallotStore::open(temp_dir.path()).unwrap();
    let roster = CandidateRoster::new(store);

    assert_eq!(roster.seed(&names(&["Cleopatra"])).unwrap(), 1);
    assert_eq!(roster.seed(&names(&["Napoleon Bonaparte"])).unwrap(), 0);

    assert!(roster.contains("Cleopatra").unwrap());
    assert!(!roster.contains("Napoleon Bonaparte").unwrap());
    assert_eq!(roster.len(), 1);
}
