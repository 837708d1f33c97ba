// BallotStore - Persistent storage using sled
//
// Holds the named trees for:
// - Ledger blocks (keyed by big-endian index)
// - Voter records
// - Candidate roster
// - Ledger metadata (tip pointer, link index, integrity halt)

use crate::storage::scope::{CommitAbort, CommitScope};
use serde::Serialize;
use sled::transaction::{ConflictableTransactionResult, TransactionError, Transactional};
use std::path::Path;
use thiserror::Error;

/// Tree names and metadata keys
pub(crate) mod keys {
    pub const BLOCKS_TREE: &str = "blocks";
    pub const VOTERS_TREE: &str = "voters";
    pub const CANDIDATES_TREE: &str = "candidates";
    pub const META_TREE: &str = "meta";

    pub const LEDGER_TIP: &[u8] = b"ledger:tip";
    pub const LEDGER_HALT: &[u8] = b"ledger:halt";
    pub const LINK_PREFIX: &[u8] = b"link:";
    pub const CANDIDATES_SEEDED: &[u8] = b"candidates:seeded";

    /// Key of the block at `index`
    pub fn block(index: u64) -> [u8; 8] {
        index.to_be_bytes()
    }

    /// Key recording which block consumed `previous_hash`
    pub fn link(previous_hash: &str) -> Vec<u8> {
        [LINK_PREFIX, previous_hash.as_bytes()].concat()
    }
}

/// Errors from storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to open database: {0}")]
    OpenFailed(String),

    #[error("Database operation failed: {0}")]
    DatabaseError(String),

    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    #[error("Flush failed: {0}")]
    FlushFailed(String),
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::DatabaseError(err.to_string())
    }
}

/// Statistics about the storage
#[derive(Clone, Debug, Serialize)]
pub struct StorageStats {
    pub block_count: usize,
    pub voter_count: usize,
    pub candidate_count: usize,
    /// Approximate disk size in bytes
    pub disk_size_bytes: u64,
}

/// Handle to the ballot database.
///
/// Cloning is cheap: every clone shares the same sled instance, so one
/// handle can be given to each worker.
#[derive(Clone)]
pub struct BallotStore {
    db: sled::Db,
    blocks: sled::Tree,
    voters: sled::Tree,
    candidates: sled::Tree,
    meta: sled::Tree,
}

impl BallotStore {
    /// Open or create a store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path).map_err(|e| StoreError::OpenFailed(e.to_string()))?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self, StoreError> {
        let blocks = db.open_tree(keys::BLOCKS_TREE)?;
        let voters = db.open_tree(keys::VOTERS_TREE)?;
        let candidates = db.open_tree(keys::CANDIDATES_TREE)?;
        let meta = db.open_tree(keys::META_TREE)?;
        Ok(Self {
            db,
            blocks,
            voters,
            candidates,
            meta,
        })
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db
            .flush()
            .map_err(|e| StoreError::FlushFailed(e.to_string()))?;
        Ok(())
    }

    /// Get storage statistics
    pub fn stats(&self) -> Result<StorageStats, StoreError> {
        Ok(StorageStats {
            block_count: self.blocks.len(),
            voter_count: self.voters.len(),
            candidate_count: self.candidates.len(),
            disk_size_bytes: self.db.size_on_disk().unwrap_or(0),
        })
    }

    pub(crate) fn blocks(&self) -> &sled::Tree {
        &self.blocks
    }

    pub(crate) fn voters(&self) -> &sled::Tree {
        &self.voters
    }

    pub(crate) fn candidates(&self) -> &sled::Tree {
        &self.candidates
    }

    pub(crate) fn meta(&self) -> &sled::Tree {
        &self.meta
    }

    /// Run `f` as one serializable transaction over the blocks, meta and
    /// voters trees.
    ///
    /// Either every write made through the scope lands or none does. sled may
    /// re-run `f` when it detects a concurrent conflicting transaction, so
    /// `f` must not have side effects outside the scope.
    pub fn commit<A, F>(&self, f: F) -> Result<A, TransactionError<CommitAbort>>
    where
        F: Fn(&CommitScope<'_>) -> ConflictableTransactionResult<A, CommitAbort>,
    {
        (&self.blocks, &self.meta, &self.voters).transaction(|(blocks, meta, voters)| {
            f(&CommitScope::new(blocks, meta, voters))
        })
    }

    /// Remove a metadata key outside of any commit
    pub(crate) fn remove_meta(&self, key: &[u8]) -> Result<(), StoreError> {
        self.meta.remove(key)?;
        Ok(())
    }

    /// Write a metadata key outside of any commit
    pub(crate) fn put_meta(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.meta.insert(key, value)?;
        Ok(())
    }
}
