// Seed roster - voters and candidates written once at initialization

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// A voter to register at seeding time
#[derive(Clone, Serialize, Deserialize)]
pub struct VoterSeed {
    pub usercode: String,
    pub passcode: String,
}

impl VoterSeed {
    pub fn new(usercode: &str, passcode: &str) -> Self {
        Self {
            usercode: usercode.to_string(),
            passcode: passcode.to_string(),
        }
    }
}

impl fmt::Debug for VoterSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoterSeed")
            .field("usercode", &self.usercode)
            .field("passcode", &"[redacted]")
            .finish()
    }
}

/// Voters and candidates to seed.
///
/// Loaded from JSON of the form
/// `{"voters": [{"usercode": "..", "passcode": ".."}], "candidates": [".."]}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SeedConfig {
    #[serde(default)]
    pub voters: Vec<VoterSeed>,
    #[serde(default)]
    pub candidates: Vec<String>,
}

impl SeedConfig {
    /// Parse a seed roster from JSON text
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let seed: SeedConfig = serde_json::from_str(text)?;
        seed.validate()?;
        Ok(seed)
    }

    /// Load a seed roster from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json(&text)
    }

    /// Reject empty fields and duplicates
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut usercodes = HashSet::new();
        for voter in &self.voters {
            if voter.usercode.is_empty() || voter.passcode.is_empty() {
                return Err(ConfigError::Invalid(
                    "voter usercode and passcode must not be empty".to_string(),
                ));
            }
            if !usercodes.insert(voter.usercode.as_str()) {
                return Err(ConfigError::DuplicateVoter(voter.usercode.clone()));
            }
        }

        let mut names = HashSet::new();
        for name in &self.candidates {
            if name.is_empty() {
                return Err(ConfigError::Invalid(
                    "candidate name must not be empty".to_string(),
                ));
            }
            if !names.insert(name.as_str()) {
                return Err(ConfigError::DuplicateCandidate(name.clone()));
            }
        }
        Ok(())
    }
}

impl Default for SeedConfig {
    /// A curated roster for local development and demos
    fn default() -> Self {
        Self {
            voters: vec![
                VoterSeed::new("reshma", "1234"),
                VoterSeed::new("vanmathi", "5678"),
                VoterSeed::new("amar", "9894"),
                VoterSeed::new("divya", "3456"),
                VoterSeed::new("matheu", "7890"),
                VoterSeed::new("nicola", "6969"),
            ],
            candidates: [
                "Julius Caesar",
                "Cleopatra",
                "Napoleon Bonaparte",
                "Queen Elizabeth I",
                "Abraham Lincoln",
                "Winston Churchill",
                "Martin Luther King Jr.",
            ]
            .iter()
            .map(|name| name.to_string())
            .collect(),
        }
    }
}
