// LedgerStore - ordered, append-only block sequence with optimistic tip guard

use crate::chain::{
    Block, BlockError, ChainReport, ChainVerifier, IntegrityError, GENESIS_PREVIOUS_HASH,
};
use crate::storage::{keys, BallotStore, CommitAbort, CommitScope, StoreError};
use serde::{Deserialize, Serialize};
use sled::transaction::{abort, ConflictableTransactionResult, TransactionError};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Reads of the block range are retried this many times when a concurrent
/// commit is only partially visible.
const SNAPSHOT_READ_ATTEMPTS: usize = 4;

/// Errors from ledger operations
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Append conflict: tip is {actual}, expected {expected}")]
    Conflict { expected: String, actual: String },

    #[error("Ledger has not been initialized with a genesis block")]
    NotInitialized,

    #[error("Ledger already initialized")]
    AlreadyInitialized,

    #[error("Chain corrupted: {0}")]
    ChainCorrupted(IntegrityError),

    #[error("Invalid block: {0}")]
    InvalidBlock(String),

    #[error("Storage failure: {0}")]
    Storage(#[from] StoreError),
}

impl From<sled::Error> for LedgerError {
    fn from(err: sled::Error) -> Self {
        LedgerError::Storage(err.into())
    }
}

impl From<BlockError> for LedgerError {
    fn from(err: BlockError) -> Self {
        LedgerError::InvalidBlock(err.to_string())
    }
}

impl From<TransactionError<CommitAbort>> for LedgerError {
    fn from(err: TransactionError<CommitAbort>) -> Self {
        match err {
            TransactionError::Abort(abort) => abort.into(),
            TransactionError::Storage(e) => e.into(),
        }
    }
}

impl From<CommitAbort> for LedgerError {
    fn from(abort: CommitAbort) -> Self {
        match abort {
            CommitAbort::TipMoved { expected, actual } => LedgerError::Conflict { expected, actual },
            CommitAbort::ForkRejected { previous_hash } => LedgerError::Conflict {
                expected: previous_hash.clone(),
                actual: previous_hash,
            },
            CommitAbort::NotInitialized => LedgerError::NotInitialized,
            CommitAbort::AlreadyInitialized => LedgerError::AlreadyInitialized,
            CommitAbort::Halted(e) | CommitAbort::TipCorrupted(e) => LedgerError::ChainCorrupted(e),
            CommitAbort::MalformedBlock(reason) => LedgerError::InvalidBlock(reason),
            CommitAbort::Corrupt(reason) => {
                LedgerError::Storage(StoreError::DeserializationFailed(reason))
            }
            other @ (CommitAbort::UnknownVoter | CommitAbort::AlreadyVoted) => {
                LedgerError::InvalidBlock(other.to_string())
            }
        }
    }
}

/// Pointer to the last appended block, written atomically with it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct TipPointer {
    index: u64,
    hash: String,
}

impl TipPointer {
    fn to_bytes(&self) -> Vec<u8> {
        postcard::to_allocvec(self).unwrap_or_default()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, StoreError> {
        postcard::from_bytes(bytes).map_err(|e| StoreError::DeserializationFailed(e.to_string()))
    }
}

fn decode_block(bytes: &[u8]) -> Result<Block, StoreError> {
    Block::from_bytes(bytes).map_err(|e| StoreError::DeserializationFailed(e.to_string()))
}

fn decode_halt(bytes: &[u8]) -> Result<IntegrityError, StoreError> {
    postcard::from_bytes(bytes).map_err(|e| StoreError::DeserializationFailed(e.to_string()))
}

/// Append-only ledger over the `blocks` and `meta` trees.
///
/// Blocks are keyed by index and never rewritten. The tip pointer, the
/// block and its `link:` entry are written in one commit, so at most one
/// block can ever claim a given `previousHash`.
#[derive(Clone)]
pub struct LedgerStore {
    store: BallotStore,
}

impl LedgerStore {
    pub fn new(store: BallotStore) -> Self {
        Self { store }
    }

    /// Check whether the genesis block exists
    pub fn is_initialized(&self) -> Result<bool, LedgerError> {
        Ok(self.store.meta().contains_key(keys::LEDGER_TIP)?)
    }

    /// Number of blocks including genesis
    pub fn len(&self) -> Result<u64, LedgerError> {
        Ok(self.tip_pointer()?.map(|tip| tip.index + 1).unwrap_or(0))
    }

    pub fn is_empty(&self) -> Result<bool, LedgerError> {
        Ok(self.len()? == 0)
    }

    fn tip_pointer(&self) -> Result<Option<TipPointer>, LedgerError> {
        match self.store.meta().get(keys::LEDGER_TIP)? {
            Some(bytes) => Ok(Some(TipPointer::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Get a block by index
    pub fn get(&self, index: u64) -> Result<Option<Block>, LedgerError> {
        match self.store.blocks().get(keys::block(index))? {
            Some(bytes) => Ok(Some(decode_block(&bytes)?)),
            None => Ok(None),
        }
    }

    /// The last appended block
    pub fn tip(&self) -> Result<Block, LedgerError> {
        for _ in 0..SNAPSHOT_READ_ATTEMPTS {
            let pointer = self.tip_pointer()?.ok_or(LedgerError::NotInitialized)?;
            if let Some(block) = self.get(pointer.index)? {
                return Ok(block);
            }
            std::thread::yield_now();
        }
        Err(LedgerError::Storage(StoreError::DeserializationFailed(
            "tip pointer references a missing block".to_string(),
        )))
    }

    /// Create the genesis block if the ledger is empty.
    ///
    /// Returns the genesis block when it was created by this call.
    pub fn initialize(&self, timestamp: String) -> Result<Option<Block>, LedgerError> {
        if self.is_initialized()? {
            return Ok(None);
        }

        let genesis = Block::genesis(timestamp)?;
        match self
            .store
            .commit(|scope| Self::append_in(scope, &genesis, GENESIS_PREVIOUS_HASH))
        {
            Ok(()) => {
                self.store.flush()?;
                info!(hash = %genesis.hash(), "Genesis block created");
                Ok(Some(genesis))
            }
            Err(TransactionError::Abort(CommitAbort::AlreadyInitialized)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Append `block` only if the tip hash still equals `expected_previous_hash`
    pub fn append(&self, block: Block, expected_previous_hash: &str) -> Result<Block, LedgerError> {
        let result = self
            .store
            .commit(|scope| Self::append_in(scope, &block, expected_previous_hash));

        match result {
            Ok(()) => {
                debug!(index = block.index(), hash = %block.hash(), "Block appended");
                Ok(block)
            }
            Err(TransactionError::Abort(CommitAbort::TipCorrupted(e))) => {
                self.halt(&e)?;
                Err(LedgerError::ChainCorrupted(e))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Transactional body of `append`, shared with the vote coordinator.
    ///
    /// Refuses to write while an integrity halt is recorded, re-hashes the
    /// current tip before linking to it, and rejects any block that does not
    /// extend exactly that tip.
    pub(crate) fn append_in(
        scope: &CommitScope<'_>,
        block: &Block,
        expected_previous_hash: &str,
    ) -> ConflictableTransactionResult<(), CommitAbort> {
        if let Some(bytes) = scope.meta().get(keys::LEDGER_HALT)? {
            let reason = match decode_halt(&bytes) {
                Ok(reason) => reason,
                Err(e) => return abort(CommitAbort::Corrupt(e.to_string())),
            };
            return abort(CommitAbort::Halted(reason));
        }

        let tip = match scope.meta().get(keys::LEDGER_TIP)? {
            Some(bytes) => match TipPointer::from_bytes(&bytes) {
                Ok(tip) => Some(tip),
                Err(e) => return abort(CommitAbort::Corrupt(e.to_string())),
            },
            None => None,
        };

        let expected_index = match &tip {
            None if expected_previous_hash == GENESIS_PREVIOUS_HASH => 0,
            None => return abort(CommitAbort::NotInitialized),
            Some(_) if block.is_genesis() => return abort(CommitAbort::AlreadyInitialized),
            Some(tip) if tip.hash != expected_previous_hash => {
                return abort(CommitAbort::TipMoved {
                    expected: expected_previous_hash.to_string(),
                    actual: tip.hash.clone(),
                });
            }
            Some(tip) => {
                let stored = match scope.blocks().get(keys::block(tip.index))? {
                    Some(bytes) => match decode_block(&bytes) {
                        Ok(stored) => stored,
                        Err(e) => return abort(CommitAbort::Corrupt(e.to_string())),
                    },
                    None => return abort(CommitAbort::Corrupt("tip block missing".to_string())),
                };
                if stored.hash() != tip.hash || !stored.is_hash_valid() {
                    let computed = stored.recompute_hash().unwrap_or_default();
                    return abort(CommitAbort::TipCorrupted(IntegrityError::HashMismatch {
                        index: stored.index(),
                        stored: tip.hash.clone(),
                        computed,
                    }));
                }
                tip.index + 1
            }
        };

        if block.index() != expected_index {
            return abort(CommitAbort::MalformedBlock(format!(
                "index {} does not follow tip (expected {})",
                block.index(),
                expected_index
            )));
        }
        if block.previous_hash() != expected_previous_hash {
            return abort(CommitAbort::MalformedBlock(format!(
                "previousHash {} does not match expected {}",
                block.previous_hash(),
                expected_previous_hash
            )));
        }
        if !block.is_hash_valid() {
            return abort(CommitAbort::MalformedBlock(format!(
                "hash {} does not match block contents",
                block.hash()
            )));
        }

        let link = keys::link(block.previous_hash());
        if scope.meta().get(&link)?.is_some() {
            return abort(CommitAbort::ForkRejected {
                previous_hash: block.previous_hash().to_string(),
            });
        }

        let pointer = TipPointer {
            index: block.index(),
            hash: block.hash().to_string(),
        };
        scope
            .blocks()
            .insert(keys::block(block.index()).to_vec(), block.to_bytes())?;
        scope
            .meta()
            .insert(link, block.index().to_be_bytes().to_vec())?;
        scope.meta().insert(keys::LEDGER_TIP, pointer.to_bytes())?;
        Ok(())
    }

    /// Full chain in append order, read as a consistent prefix.
    ///
    /// The tip pointer is read first and only blocks up to it are returned;
    /// blocks are immutable, so anything at or below a committed tip is final.
    pub fn all(&self) -> Result<Vec<Block>, LedgerError> {
        for attempt in 1..=SNAPSHOT_READ_ATTEMPTS {
            let Some(tip) = self.tip_pointer()? else {
                return Ok(Vec::new());
            };

            let expected = tip.index.saturating_add(1);
            let stored = self.store.blocks().len() as u64;
            let mut blocks = Vec::with_capacity(expected.min(stored) as usize);
            for entry in self.store.blocks().range(..=keys::block(tip.index)) {
                let (_, bytes) = entry?;
                blocks.push(decode_block(&bytes)?);
            }

            if blocks.len() as u64 == expected {
                return Ok(blocks);
            }
            debug!(
                attempt,
                expected,
                found = blocks.len(),
                "Partial chain read, retrying"
            );
            std::thread::yield_now();
        }
        Err(LedgerError::Storage(StoreError::DeserializationFailed(
            "block range has gaps below the tip".to_string(),
        )))
    }

    /// Recorded integrity failure, if appends are halted
    pub fn halt_reason(&self) -> Result<Option<IntegrityError>, LedgerError> {
        match self.store.meta().get(keys::LEDGER_HALT)? {
            Some(bytes) => Ok(Some(decode_halt(&bytes)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn halt(&self, reason: &IntegrityError) -> Result<(), LedgerError> {
        error!(index = reason.index(), %reason, "Hash chain corrupted; halting appends");
        let bytes = postcard::to_allocvec(reason).unwrap_or_default();
        self.store.put_meta(keys::LEDGER_HALT, &bytes)?;
        self.store.flush()?;
        Ok(())
    }

    /// Recompute every hash and link.
    ///
    /// A failure is recorded as an integrity halt: every later append is
    /// refused until `reconcile` succeeds.
    pub fn verify(&self) -> Result<ChainReport, LedgerError> {
        let blocks = self.all()?;
        match ChainVerifier::verify(&blocks) {
            Ok(report) => Ok(report),
            Err(e) => {
                self.halt(&e)?;
                Err(LedgerError::ChainCorrupted(e))
            }
        }
    }

    /// Clear an integrity halt after the chain has been repaired externally.
    ///
    /// The chain is verified first; the halt stays in place if it still fails.
    pub fn reconcile(&self) -> Result<ChainReport, LedgerError> {
        let blocks = self.all()?;
        let report = ChainVerifier::verify(&blocks).map_err(LedgerError::ChainCorrupted)?;

        if self.halt_reason()?.is_some() {
            self.store.remove_meta(keys::LEDGER_HALT)?;
            self.store.flush()?;
            warn!(length = report.length, "Integrity halt cleared after reconciliation");
        }
        Ok(report)
    }
}
