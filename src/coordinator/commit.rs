// Vote Coordinator - eligibility check, block construction and atomic commit

use crate::chain::{timestamp_now, Block, BlockError, IntegrityError, VoteData};
use crate::config::BallotConfig;
use crate::coordinator::in_flight::InFlightVotes;
use crate::coordinator::vote::{RejectReason, VoteOutcome, VotePhase, VoteRequest};
use crate::ledger::{LedgerError, LedgerStore};
use crate::registry::{CandidateRoster, RegistryError, VoterRegistry};
use crate::storage::{BallotStore, CommitAbort};
use rand::Rng;
use sled::transaction::TransactionError;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Fatal coordinator failures. Eligibility and conflict problems are never
/// errors; they come back as `VoteOutcome::Rejected`.
#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("Storage failure: {0}")]
    StorageFailure(String),

    #[error("Chain corrupted: {0}")]
    ChainCorrupted(IntegrityError),

    #[error("Ledger has not been initialized with a genesis block")]
    NotInitialized,

    #[error("Invalid block: {0}")]
    InvalidBlock(String),
}

impl From<LedgerError> for CoordinatorError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::ChainCorrupted(e) => CoordinatorError::ChainCorrupted(e),
            LedgerError::NotInitialized => CoordinatorError::NotInitialized,
            LedgerError::InvalidBlock(reason) => CoordinatorError::InvalidBlock(reason),
            other => CoordinatorError::StorageFailure(other.to_string()),
        }
    }
}

impl From<RegistryError> for CoordinatorError {
    fn from(err: RegistryError) -> Self {
        CoordinatorError::StorageFailure(err.to_string())
    }
}

impl From<BlockError> for CoordinatorError {
    fn from(err: BlockError) -> Self {
        CoordinatorError::InvalidBlock(err.to_string())
    }
}

/// Phase tracking for one request, for logs and transition checks
struct VoteTransaction<'a> {
    usercode: &'a str,
    phase: VotePhase,
}

impl<'a> VoteTransaction<'a> {
    fn new(usercode: &'a str) -> Self {
        Self {
            usercode,
            phase: VotePhase::Idle,
        }
    }

    fn advance(&mut self, next: VotePhase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "illegal vote transition {:?} -> {:?}",
            self.phase,
            next
        );
        debug!(usercode = self.usercode, from = ?self.phase, to = ?next, "Vote phase");
        self.phase = next;
    }

    fn reject(&mut self, reason: RejectReason) -> VoteOutcome {
        self.advance(VotePhase::Rejected);
        info!(usercode = self.usercode, %reason, "Vote rejected");
        VoteOutcome::rejected(reason)
    }
}

/// Runs between the tip read and the commit, so tests can move the tip
#[cfg(test)]
type TipRace = Box<dyn Fn(&LedgerStore) + Send + Sync>;

/// Result of one commit attempt
enum Attempt {
    Done(VoteOutcome),
    Retry,
}

/// Orchestrates a vote from eligibility check to durable commit.
///
/// The block append and the voter's flag flip run in one sled transaction.
/// The append is conditioned on the tip read just before building the
/// block; when another vote lands first the request rebuilds against the
/// new tip, up to `max_append_retries` times, then reports `Busy`.
pub struct VoteCoordinator {
    store: BallotStore,
    ledger: LedgerStore,
    registry: VoterRegistry,
    roster: CandidateRoster,
    in_flight: InFlightVotes,
    max_append_retries: u32,
    retry_backoff_ms: u64,
    flush_on_commit: bool,
    #[cfg(test)]
    tip_race: Option<TipRace>,
}

impl VoteCoordinator {
    pub fn new(store: BallotStore, config: &BallotConfig) -> Self {
        Self {
            ledger: LedgerStore::new(store.clone()),
            registry: VoterRegistry::new(store.clone(), config.passcode),
            roster: CandidateRoster::new(store.clone()),
            store,
            in_flight: InFlightVotes::new(),
            max_append_retries: config.max_append_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            flush_on_commit: config.flush_on_commit,
            #[cfg(test)]
            tip_race: None,
        }
    }

    pub fn ledger(&self) -> &LedgerStore {
        &self.ledger
    }

    pub fn registry(&self) -> &VoterRegistry {
        &self.registry
    }

    pub fn roster(&self) -> &CandidateRoster {
        &self.roster
    }

    pub fn store(&self) -> &BallotStore {
        &self.store
    }

    /// Run one vote request to a terminal phase
    pub fn cast_vote(&self, request: &VoteRequest) -> Result<VoteOutcome, CoordinatorError> {
        let mut tx = VoteTransaction::new(&request.usercode);

        if !request.is_complete() {
            return Ok(tx.reject(RejectReason::InputMissing));
        }

        let Some(_claim) = self.in_flight.try_acquire(&request.usercode) else {
            return Ok(tx.reject(RejectReason::AlreadyVoted));
        };

        tx.advance(VotePhase::Validating);
        let auth = self
            .registry
            .authenticate(&request.usercode, &request.passcode)?;
        if let Some(reason) = RejectReason::from_auth(auth) {
            return Ok(tx.reject(reason));
        }
        if !self.roster.contains(&request.candidate)? {
            return Ok(tx.reject(RejectReason::UnknownCandidate));
        }

        let payload = VoteData::vote(&request.usercode, &request.candidate);
        let attempts = self.max_append_retries.saturating_add(1);

        for attempt in 1..=attempts {
            tx.advance(VotePhase::Appending);
            match self.try_commit(&mut tx, &payload)? {
                Attempt::Done(outcome) => return Ok(outcome),
                Attempt::Retry if attempt < attempts => {
                    debug!(usercode = tx.usercode, attempt, "Tip moved, rebuilding block");
                    self.backoff(attempt);
                }
                Attempt::Retry => {}
            }
        }

        warn!(usercode = tx.usercode, attempts, "Append retries exhausted");
        Ok(tx.reject(RejectReason::Busy))
    }

    fn try_commit(
        &self,
        tx: &mut VoteTransaction<'_>,
        payload: &VoteData,
    ) -> Result<Attempt, CoordinatorError> {
        let usercode = tx.usercode;
        let tip = self.ledger.tip()?;
        let block = Block::new(tip.index() + 1, timestamp_now(), payload, tip.hash())?;

        self.before_commit();

        let result = self.store.commit(|scope| {
            LedgerStore::append_in(scope, &block, tip.hash())?;
            VoterRegistry::mark_voted_in(scope, usercode)?;
            Ok(())
        });

        match result {
            Ok(()) => {
                if self.flush_on_commit {
                    self.store
                        .flush()
                        .map_err(|e| CoordinatorError::StorageFailure(e.to_string()))?;
                }
                tx.advance(VotePhase::Committed);
                info!(
                    usercode = tx.usercode,
                    index = block.index(),
                    hash = %block.hash(),
                    "Vote committed"
                );
                Ok(Attempt::Done(VoteOutcome::Committed { block }))
            }
            Err(TransactionError::Abort(abort)) => match abort {
                CommitAbort::TipMoved { .. } | CommitAbort::ForkRejected { .. } => {
                    Ok(Attempt::Retry)
                }
                CommitAbort::AlreadyVoted => {
                    Ok(Attempt::Done(tx.reject(RejectReason::AlreadyVoted)))
                }
                CommitAbort::UnknownVoter => {
                    Ok(Attempt::Done(tx.reject(RejectReason::UserNotFound)))
                }
                CommitAbort::Halted(e) => {
                    error!(usercode = tx.usercode, %e, "Vote refused: ledger halted");
                    Err(CoordinatorError::ChainCorrupted(e))
                }
                CommitAbort::TipCorrupted(e) => {
                    self.ledger.halt(&e)?;
                    Err(CoordinatorError::ChainCorrupted(e))
                }
                CommitAbort::NotInitialized => Err(CoordinatorError::NotInitialized),
                CommitAbort::AlreadyInitialized | CommitAbort::MalformedBlock(_) => {
                    Err(CoordinatorError::InvalidBlock(abort.to_string()))
                }
                CommitAbort::Corrupt(reason) => Err(CoordinatorError::StorageFailure(reason)),
            },
            Err(TransactionError::Storage(e)) => {
                error!(usercode = tx.usercode, error = %e, "Vote commit failed");
                Err(CoordinatorError::StorageFailure(e.to_string()))
            }
        }
    }

    #[cfg(test)]
    fn before_commit(&self) {
        if let Some(race) = &self.tip_race {
            race(&self.ledger);
        }
    }

    #[cfg(not(test))]
    fn before_commit(&self) {}

    /// Sleep a jittered, linearly growing interval before the next attempt
    fn backoff(&self, attempt: u32) {
        if self.retry_backoff_ms == 0 {
            return;
        }
        let ceiling = self.retry_backoff_ms.saturating_mul(u64::from(attempt));
        let millis = rand::thread_rng().gen_range(0..=ceiling);
        std::thread::sleep(Duration::from_millis(millis));
    }
}
