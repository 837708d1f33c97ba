// CommitScope - the explicit transaction boundary handed to ledger and registry writes

use crate::chain::IntegrityError;
use sled::transaction::TransactionalTree;
use thiserror::Error;

/// Reasons a commit is aborted.
///
/// An abort discards every write made in the scope.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommitAbort {
    #[error("Tip moved: expected {expected}, found {actual}")]
    TipMoved { expected: String, actual: String },

    #[error("A block already links to {previous_hash}")]
    ForkRejected { previous_hash: String },

    #[error("Ledger has not been initialized with a genesis block")]
    NotInitialized,

    #[error("Ledger already initialized")]
    AlreadyInitialized,

    #[error("Ledger halted: {0}")]
    Halted(IntegrityError),

    #[error("Tip failed verification: {0}")]
    TipCorrupted(IntegrityError),

    #[error("Malformed block: {0}")]
    MalformedBlock(String),

    #[error("Voter not found")]
    UnknownVoter,

    #[error("Voter has already voted")]
    AlreadyVoted,

    #[error("Stored record is unreadable: {0}")]
    Corrupt(String),
}

/// Transactional views of the trees a vote commit touches
pub struct CommitScope<'a> {
    blocks: &'a TransactionalTree,
    meta: &'a TransactionalTree,
    voters: &'a TransactionalTree,
}

impl<'a> CommitScope<'a> {
    pub(crate) fn new(
        blocks: &'a TransactionalTree,
        meta: &'a TransactionalTree,
        voters: &'a TransactionalTree,
    ) -> Self {
        Self {
            blocks,
            meta,
            voters,
        }
    }

    pub(crate) fn blocks(&self) -> &TransactionalTree {
        self.blocks
    }

    pub(crate) fn meta(&self) -> &TransactionalTree {
        self.meta
    }

    pub(crate) fn voters(&self) -> &TransactionalTree {
        self.voters
    }
}
