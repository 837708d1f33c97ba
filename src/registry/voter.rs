// Voter Registry - eligibility state per voter

use crate::registry::passcode::{PasscodeError, PasscodeHash, PasscodeParams};
use crate::storage::{BallotStore, CommitAbort, CommitScope, StoreError};
use serde::{Deserialize, Serialize};
use sled::transaction::{abort, ConflictableTransactionResult};
use thiserror::Error;
use tracing::{debug, info};

/// Errors from registry operations
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Usercode must not be empty")]
    EmptyUsercode,

    #[error("Passcode error: {0}")]
    Passcode(#[from] PasscodeError),

    #[error("Storage failure: {0}")]
    Storage(#[from] StoreError),
}

impl From<sled::Error> for RegistryError {
    fn from(err: sled::Error) -> Self {
        RegistryError::Storage(err.into())
    }
}

/// Outcome of checking a voter's credentials
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthResult {
    Ok,
    NotFound,
    WrongPasscode,
    AlreadyVoted,
}

/// Stored voter record
#[derive(Clone, Debug, Serialize, Deserialize)]
struct VoterRecord {
    usercode: String,
    passcode: PasscodeHash,
    has_voted: bool,
}

impl VoterRecord {
    fn to_bytes(&self) -> Vec<u8> {
        postcard::to_allocvec(self).unwrap_or_default()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, StoreError> {
        postcard::from_bytes(bytes).map_err(|e| StoreError::DeserializationFailed(e.to_string()))
    }
}

/// Public view of a voter, without credentials
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterStatus {
    pub usercode: String,
    pub has_voted: bool,
}

/// Voter eligibility over the `voters` tree.
///
/// `has_voted` only ever moves from false to true, and only inside a
/// commit that also appends the voter's block.
#[derive(Clone)]
pub struct VoterRegistry {
    store: BallotStore,
    params: PasscodeParams,
}

impl VoterRegistry {
    pub fn new(store: BallotStore, params: PasscodeParams) -> Self {
        Self { store, params }
    }

    fn load(&self, usercode: &str) -> Result<Option<VoterRecord>, RegistryError> {
        match self.store.voters().get(usercode.as_bytes())? {
            Some(bytes) => Ok(Some(VoterRecord::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Register a voter if the usercode is not taken.
    ///
    /// Returns `false` and leaves the existing record untouched when the
    /// voter already exists, so credentials and voting status are never
    /// overwritten.
    pub fn register(&self, usercode: &str, passcode: &str) -> Result<bool, RegistryError> {
        if usercode.is_empty() {
            return Err(RegistryError::EmptyUsercode);
        }
        if self.store.voters().contains_key(usercode.as_bytes())? {
            return Ok(false);
        }

        let record = VoterRecord {
            usercode: usercode.to_string(),
            passcode: PasscodeHash::new(passcode, self.params)?,
            has_voted: false,
        };
        let swapped = self.store.voters().compare_and_swap(
            usercode.as_bytes(),
            None as Option<&[u8]>,
            Some(record.to_bytes()),
        )?;

        match swapped {
            Ok(()) => {
                info!(usercode, "Voter registered");
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    /// Check credentials and eligibility.
    ///
    /// The passcode is checked before the voted flag, so a wrong passcode
    /// never reveals whether the voter has voted.
    pub fn authenticate(&self, usercode: &str, passcode: &str) -> Result<AuthResult, RegistryError> {
        let Some(record) = self.load(usercode)? else {
            debug!(usercode, "Authentication failed: unknown voter");
            return Ok(AuthResult::NotFound);
        };

        if !record.passcode.verify(passcode)? {
            debug!(usercode, "Authentication failed: wrong passcode");
            return Ok(AuthResult::WrongPasscode);
        }

        if record.has_voted {
            return Ok(AuthResult::AlreadyVoted);
        }

        Ok(AuthResult::Ok)
    }

    /// Current status of a voter
    pub fn status(&self, usercode: &str) -> Result<Option<VoterStatus>, RegistryError> {
        Ok(self.load(usercode)?.map(|record| VoterStatus {
            usercode: record.usercode,
            has_voted: record.has_voted,
        }))
    }

    /// All voters in usercode order
    pub fn list(&self) -> Result<Vec<VoterStatus>, RegistryError> {
        let mut voters = Vec::new();
        for entry in self.store.voters().iter() {
            let (_, bytes) = entry?;
            let record = VoterRecord::from_bytes(&bytes)?;
            voters.push(VoterStatus {
                usercode: record.usercode,
                has_voted: record.has_voted,
            });
        }
        Ok(voters)
    }

    pub fn len(&self) -> usize {
        self.store.voters().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.voters().is_empty()
    }

    /// Flip the voted flag inside a vote commit.
    ///
    /// Only reachable through a `CommitScope`, so the flag can never be set
    /// without the matching block landing in the same transaction.
    pub(crate) fn mark_voted_in(
        scope: &CommitScope<'_>,
        usercode: &str,
    ) -> ConflictableTransactionResult<(), CommitAbort> {
        let Some(bytes) = scope.voters().get(usercode.as_bytes())? else {
            return abort(CommitAbort::UnknownVoter);
        };
        let mut record = match VoterRecord::from_bytes(&bytes) {
            Ok(record) => record,
            Err(e) => return abort(CommitAbort::Corrupt(e.to_string())),
        };

        if record.has_voted {
            return abort(CommitAbort::AlreadyVoted);
        }

        record.has_voted = true;
        scope
            .voters()
            .insert(usercode.as_bytes(), record.to_bytes())?;
        Ok(())
    }
}
