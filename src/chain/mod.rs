// Chain module - THE RECORD
// Block layout, canonical hashing, and the external verification walk

mod block;
mod hasher;
mod verifier;

pub use block::{
    format_timestamp, timestamp_now, Block, BlockError, VoteData, GENESIS_MESSAGE,
    GENESIS_PREVIOUS_HASH,
};
pub use hasher::{to_canonical_json, BlockHasher, CanonicalFormatter, HasherError};
pub use verifier::{ChainReport, ChainVerifier, IntegrityError};
