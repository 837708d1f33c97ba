// Passcode hashing - salted Argon2id digests compared in constant time

use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;
use thiserror::Error;

const SALT_LEN: usize = 16;
const DIGEST_LEN: usize = 32;

#[derive(Error, Debug)]
pub enum PasscodeError {
    #[error("Invalid passcode parameters: {0}")]
    InvalidParams(String),

    #[error("Passcode hashing failed: {0}")]
    HashingFailed(String),
}

/// Argon2id cost parameters.
///
/// Stored alongside every digest, so changing the defaults never breaks
/// verification of voters registered earlier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasscodeParams {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Number of passes
    pub iterations: u32,
}

impl Default for PasscodeParams {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
        }
    }
}

impl PasscodeParams {
    fn hasher(&self) -> Result<Argon2<'static>, PasscodeError> {
        let params = Params::new(self.memory_kib, self.iterations, 1, Some(DIGEST_LEN))
            .map_err(|e| PasscodeError::InvalidParams(e.to_string()))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    /// Check that the parameters are accepted by Argon2
    pub fn validate(&self) -> Result<(), PasscodeError> {
        self.hasher().map(|_| ())
    }
}

/// A salted passcode digest. Never printed.
#[derive(Clone, Serialize, Deserialize)]
pub struct PasscodeHash {
    params: PasscodeParams,
    salt: [u8; SALT_LEN],
    digest: [u8; DIGEST_LEN],
}

impl fmt::Debug for PasscodeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasscodeHash([redacted])")
    }
}

impl PasscodeHash {
    /// Hash a passcode under a fresh random salt
    pub fn new(passcode: &str, params: PasscodeParams) -> Result<Self, PasscodeError> {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let digest = Self::derive(passcode, &salt, &params)?;
        Ok(Self {
            params,
            salt,
            digest,
        })
    }

    fn derive(
        passcode: &str,
        salt: &[u8; SALT_LEN],
        params: &PasscodeParams,
    ) -> Result<[u8; DIGEST_LEN], PasscodeError> {
        let mut digest = [0u8; DIGEST_LEN];
        params
            .hasher()?
            .hash_password_into(passcode.as_bytes(), salt, &mut digest)
            .map_err(|e| PasscodeError::HashingFailed(e.to_string()))?;
        Ok(digest)
    }

    /// Check a candidate passcode against this digest
    pub fn verify(&self, passcode: &str) -> Result<bool, PasscodeError> {
        let candidate = Self::derive(passcode, &self.salt, &self.params)?;
        Ok(bool::from(candidate.as_slice().ct_eq(self.digest.as_slice())))
    }
}
