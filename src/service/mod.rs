// Service module - THE PUBLIC CONTRACTS
// Login, candidate listing, voting and chain access over one shared coordinator

mod seed;

pub use seed::SeedReport;

use crate::chain::{Block, ChainReport};
use crate::config::{BallotConfig, ConfigError, SeedConfig};
use crate::coordinator::{CoordinatorError, VoteCoordinator, VoteOutcome, VoteRequest};
use crate::ledger::LedgerError;
use crate::registry::{AuthResult, RegistryError, VoterStatus};
use crate::storage::{BallotStore, StorageStats, StoreError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

/// Errors surfaced by the service
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Coordinator error: {0}")]
    Coordinator(#[from] CoordinatorError),

    #[error("Usercode and passcode are required")]
    InputMissing,

    #[error("Blocking task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

/// Async front door to a ballot database.
///
/// Cloning shares the underlying coordinator, so one service can back any
/// number of concurrent request handlers. Store work runs on the tokio
/// blocking pool.
#[derive(Clone)]
pub struct BallotService {
    inner: Arc<VoteCoordinator>,
}

impl BallotService {
    /// Open the database named by `config`.
    ///
    /// With `verify_on_open` the existing chain is audited first. A corrupt
    /// chain does not fail the open; it latches the integrity halt so reads
    /// still work while appends are refused.
    pub fn open(config: BallotConfig) -> Result<Self, ServiceError> {
        config.validate()?;
        let store = BallotStore::open(&config.db_path)?;
        let coordinator = VoteCoordinator::new(store, &config);

        if config.verify_on_open && !coordinator.ledger().is_empty()? {
            match coordinator.ledger().verify() {
                Ok(report) => info!(
                    length = report.length,
                    tip = ?report.tip_hash,
                    "Chain verified on open"
                ),
                Err(LedgerError::ChainCorrupted(e)) => {
                    error!(index = e.index(), %e, "Chain failed verification on open")
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(Self {
            inner: Arc::new(coordinator),
        })
    }

    async fn run<T, F>(&self, f: F) -> Result<T, ServiceError>
    where
        T: Send + 'static,
        F: FnOnce(&VoteCoordinator) -> Result<T, ServiceError> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || f(&inner)).await?
    }

    /// Create genesis, voters and candidates that do not exist yet
    pub async fn seed(&self, roster: SeedConfig) -> Result<SeedReport, ServiceError> {
        self.run(move |coordinator| seed::apply(coordinator, &roster))
            .await
    }

    /// Check a voter's credentials and eligibility
    pub async fn login(&self, usercode: &str, passcode: &str) -> Result<AuthResult, ServiceError> {
        if usercode.is_empty() || passcode.is_empty() {
            return Err(ServiceError::InputMissing);
        }
        let usercode = usercode.to_string();
        let passcode = passcode.to_string();
        self.run(move |coordinator| {
            Ok(coordinator
                .registry()
                .authenticate(&usercode, &passcode)?)
        })
        .await
    }

    /// Candidate names in lexicographic order
    pub async fn list_candidates(&self) -> Result<Vec<String>, ServiceError> {
        self.run(|coordinator| Ok(coordinator.roster().names()?))
            .await
    }

    /// Cast one vote; eligibility problems come back as a rejected outcome
    pub async fn cast_vote(
        &self,
        usercode: &str,
        passcode: &str,
        candidate: &str,
    ) -> Result<VoteOutcome, ServiceError> {
        let request = VoteRequest::new(usercode, passcode, candidate);
        self.run(move |coordinator| Ok(coordinator.cast_vote(&request)?))
            .await
    }

    /// The full chain in append order
    pub async fn get_chain(&self) -> Result<Vec<Block>, ServiceError> {
        self.run(|coordinator| Ok(coordinator.ledger().all()?))
            .await
    }

    /// Recompute every hash and link; a failure halts appends
    pub async fn verify_chain(&self) -> Result<ChainReport, ServiceError> {
        self.run(|coordinator| Ok(coordinator.ledger().verify()?))
            .await
    }

    /// Re-verify a repaired chain and lift the integrity halt
    pub async fn reconcile(&self) -> Result<ChainReport, ServiceError> {
        self.run(|coordinator| Ok(coordinator.ledger().reconcile()?))
            .await
    }

    pub async fn voter_status(&self, usercode: &str) -> Result<Option<VoterStatus>, ServiceError> {
        let usercode = usercode.to_string();
        self.run(move |coordinator| Ok(coordinator.registry().status(&usercode)?))
            .await
    }

    pub async fn stats(&self) -> Result<StorageStats, ServiceError> {
        self.run(|coordinator| Ok(coordinator.store().stats()?))
            .await
    }
}
