// Block - one immutable ledger entry linked to its predecessor by hash

use crate::chain::hasher::{to_canonical_json, BlockHasher, HasherError};
use chrono::{NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// `previousHash` sentinel carried by the genesis block
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Message carried by the genesis payload
pub const GENESIS_MESSAGE: &str = "Genesis Block";

/// Errors from block construction and decoding
#[derive(Error, Debug)]
pub enum BlockError {
    #[error("Hashing failed: {0}")]
    Hashing(#[from] HasherError),

    #[error("Invalid vote data: {0}")]
    InvalidVoteData(#[from] serde_json::Error),

    #[error("Deserialization failed")]
    DeserializationFailed,
}

/// Payload recorded in a block's `voteData` field.
///
/// Field declaration order is the canonical member order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VoteData {
    Genesis { message: String },
    Vote { voter: String, candidate: String },
}

impl VoteData {
    /// The genesis payload
    pub fn genesis() -> Self {
        VoteData::Genesis {
            message: GENESIS_MESSAGE.to_string(),
        }
    }

    /// A vote payload
    pub fn vote(voter: &str, candidate: &str) -> Self {
        VoteData::Vote {
            voter: voter.to_string(),
            candidate: candidate.to_string(),
        }
    }

    /// Canonical JSON text stored in the block
    pub fn to_canonical_json(&self) -> Result<String, HasherError> {
        to_canonical_json(self)
    }

    /// Parse a stored `voteData` string
    pub fn parse(text: &str) -> Result<Self, BlockError> {
        Ok(serde_json::from_str(text)?)
    }

    /// The voter, if this is a vote payload
    pub fn voter(&self) -> Option<&str> {
        match self {
            VoteData::Vote { voter, .. } => Some(voter),
            VoteData::Genesis { .. } => None,
        }
    }

    /// The candidate, if this is a vote payload
    pub fn candidate(&self) -> Option<&str> {
        match self {
            VoteData::Vote { candidate, .. } => Some(candidate),
            VoteData::Genesis { .. } => None,
        }
    }
}

/// Format a naive UTC instant as ISO-8601 with microsecond precision.
///
/// The fractional part is omitted when it is zero.
pub fn format_timestamp(at: NaiveDateTime) -> String {
    if at.nanosecond() / 1_000 == 0 {
        at.format("%Y-%m-%dT%H:%M:%S").to_string()
    } else {
        at.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
    }
}

/// Current time in block timestamp format
pub fn timestamp_now() -> String {
    format_timestamp(Utc::now().naive_utc())
}

/// A ledger block, serialized with the public camelCase field names
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    index: u64,
    timestamp: String,
    vote_data: String,
    previous_hash: String,
    hash: String,
}

impl Block {
    /// Build a block and compute its hash
    pub fn new(
        index: u64,
        timestamp: String,
        vote_data: &VoteData,
        previous_hash: &str,
    ) -> Result<Self, BlockError> {
        let vote_data = vote_data.to_canonical_json()?;
        let hash = BlockHasher::hash(&timestamp, &vote_data, previous_hash)?;
        Ok(Self {
            index,
            timestamp,
            vote_data,
            previous_hash: previous_hash.to_string(),
            hash,
        })
    }

    /// Build the genesis block for a given timestamp
    pub fn genesis(timestamp: String) -> Result<Self, BlockError> {
        Self::new(0, timestamp, &VoteData::genesis(), GENESIS_PREVIOUS_HASH)
    }

    /// Assemble a block from stored fields without recomputing anything
    pub fn from_parts(
        index: u64,
        timestamp: String,
        vote_data: String,
        previous_hash: String,
        hash: String,
    ) -> Self {
        Self {
            index,
            timestamp,
            vote_data,
            previous_hash,
            hash,
        }
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// Canonical JSON text of the payload
    pub fn vote_data(&self) -> &str {
        &self.vote_data
    }

    pub fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }

    /// Decode the payload
    pub fn payload(&self) -> Result<VoteData, BlockError> {
        VoteData::parse(&self.vote_data)
    }

    /// Recompute the hash from the stored fields
    pub fn recompute_hash(&self) -> Result<String, HasherError> {
        BlockHasher::hash(&self.timestamp, &self.vote_data, &self.previous_hash)
    }

    /// Check that the stored hash matches the stored fields
    pub fn is_hash_valid(&self) -> bool {
        self.recompute_hash()
            .map(|computed| computed == self.hash)
            .unwrap_or(false)
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        postcard::to_allocvec(self).unwrap_or_default()
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BlockError> {
        postcard::from_bytes(bytes).map_err(|_| BlockError::DeserializationFailed)
    }
}
