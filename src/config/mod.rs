// Config module - runtime settings and the seed roster

mod seed;

pub use seed::{SeedConfig, VoterSeed};

use crate::registry::PasscodeParams;
use std::path::PathBuf;
use thiserror::Error;

/// Upper bound on the per-retry backoff, keeps every vote bounded in time
pub const MAX_RETRY_BACKOFF_MS: u64 = 1_000;

/// Errors from configuration loading and validation
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to read {path}: {reason}")]
    ReadFailed { path: String, reason: String },

    #[error("Invalid seed file: {0}")]
    InvalidSeed(#[from] serde_json::Error),

    #[error("Duplicate voter in seed: {0}")]
    DuplicateVoter(String),

    #[error("Duplicate candidate in seed: {0}")]
    DuplicateCandidate(String),
}

/// Configuration for a ballot ledger instance
#[derive(Clone, Debug)]
pub struct BallotConfig {
    /// Directory of the sled database
    pub db_path: PathBuf,
    /// Appends retried after an optimistic conflict before giving up as busy
    pub max_append_retries: u32,
    /// Linear backoff step between conflict retries, in milliseconds
    pub retry_backoff_ms: u64,
    /// Verify the whole chain when the store is opened
    pub verify_on_open: bool,
    /// Flush to disk before reporting a vote as committed
    pub flush_on_commit: bool,
    /// Argon2id cost for newly registered passcodes
    pub passcode: PasscodeParams,
}

impl BallotConfig {
    /// Create a new config with builder pattern
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_db_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.db_path = path.into();
        self
    }

    pub fn with_max_append_retries(mut self, retries: u32) -> Self {
        self.max_append_retries = retries;
        self
    }

    pub fn with_retry_backoff_ms(mut self, ms: u64) -> Self {
        self.retry_backoff_ms = ms;
        self
    }

    pub fn with_verify_on_open(mut self, verify: bool) -> Self {
        self.verify_on_open = verify;
        self
    }

    pub fn with_flush_on_commit(mut self, flush: bool) -> Self {
        self.flush_on_commit = flush;
        self
    }

    pub fn with_passcode_params(mut self, params: PasscodeParams) -> Self {
        self.passcode = params;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.db_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("db_path must not be empty".to_string()));
        }
        if self.retry_backoff_ms > MAX_RETRY_BACKOFF_MS {
            return Err(ConfigError::Invalid(format!(
                "retry_backoff_ms must be <= {}",
                MAX_RETRY_BACKOFF_MS
            )));
        }
        self.passcode
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }
}

impl Default for BallotConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("ballotchain.db"),
            max_append_retries: 8,
            retry_backoff_ms: 2,
            verify_on_open: true,
            flush_on_commit: true,
            passcode: PasscodeParams::default(),
        }
    }
}
