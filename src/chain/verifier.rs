// Chain Verifier - recomputes every hash and checks every link of a chain

use crate::chain::block::{Block, GENESIS_PREVIOUS_HASH};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a chain failed verification
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegrityError {
    #[error("Block {index}: stored hash {stored} does not match recomputed {computed}")]
    HashMismatch {
        index: u64,
        stored: String,
        computed: String,
    },

    #[error("Block {index}: previousHash {found} does not link to {expected}")]
    BrokenLink {
        index: u64,
        expected: String,
        found: String,
    },

    #[error("Expected block index {expected}, found {found}")]
    IndexGap { expected: u64, found: u64 },

    #[error("Block {index}: could not be hashed: {reason}")]
    Unhashable { index: u64, reason: String },
}

impl IntegrityError {
    /// Index of the first offending block
    pub fn index(&self) -> u64 {
        match self {
            IntegrityError::HashMismatch { index, .. }
            | IntegrityError::BrokenLink { index, .. }
            | IntegrityError::Unhashable { index, .. } => *index,
            IntegrityError::IndexGap { expected, .. } => *expected,
        }
    }
}

/// Summary of a successful verification
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainReport {
    pub length: u64,
    pub tip_hash: Option<String>,
}

/// Stateless chain auditor
pub struct ChainVerifier;

impl ChainVerifier {
    /// Verify a single block against its predecessor (`None` for genesis)
    pub fn verify_block(previous: Option<&Block>, block: &Block) -> Result<(), IntegrityError> {
        let expected_index = previous.map(|p| p.index() + 1).unwrap_or(0);
        if block.index() != expected_index {
            return Err(IntegrityError::IndexGap {
                expected: expected_index,
                found: block.index(),
            });
        }

        let expected_link = previous
            .map(|p| p.hash())
            .unwrap_or(GENESIS_PREVIOUS_HASH);
        if block.previous_hash() != expected_link {
            return Err(IntegrityError::BrokenLink {
                index: block.index(),
                expected: expected_link.to_string(),
                found: block.previous_hash().to_string(),
            });
        }

        let computed = block
            .recompute_hash()
            .map_err(|e| IntegrityError::Unhashable {
                index: block.index(),
                reason: e.to_string(),
            })?;
        if computed != block.hash() {
            return Err(IntegrityError::HashMismatch {
                index: block.index(),
                stored: block.hash().to_string(),
                computed,
            });
        }

        Ok(())
    }

    /// Verify a full chain in append order
    pub fn verify<'a, I>(blocks: I) -> Result<ChainReport, IntegrityError>
    where
        I: IntoIterator<Item = &'a Block>,
    {
        let mut previous: Option<&Block> = None;
        let mut length = 0u64;

        for block in blocks {
            Self::verify_block(previous, block)?;
            previous = Some(block);
            length += 1;
        }

        Ok(ChainReport {
            length,
            tip_hash: previous.map(|b| b.hash().to_string()),
        })
    }
}
