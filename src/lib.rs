pub mod chain;
pub mod config;
pub mod coordinator;
pub mod ledger;
pub mod logging;
pub mod registry;
pub mod service;
pub mod storage;

pub use chain::{Block, BlockHasher, ChainReport, ChainVerifier, IntegrityError, VoteData};
pub use config::{BallotConfig, SeedConfig};
pub use coordinator::{RejectReason, VoteCoordinator, VoteOutcome, VoteRequest};
pub use registry::AuthResult;
pub use service::{BallotService, SeedReport, ServiceError};
