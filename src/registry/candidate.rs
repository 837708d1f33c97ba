// Candidate roster - static reference data, written once at seeding

use crate::registry::voter::RegistryError;
use crate::storage::{keys, BallotStore, StoreError};
use serde::{Deserialize, Serialize};
use sled::transaction::{TransactionError, Transactional};
use std::convert::Infallible;
use tracing::info;

/// A candidate on the ballot
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: u64,
    pub name: String,
}

/// Candidates keyed by name, so iteration order is lexicographic
#[derive(Clone)]
pub struct CandidateRoster {
    store: BallotStore,
}

impl CandidateRoster {
    pub fn new(store: BallotStore) -> Self {
        Self { store }
    }

    /// Insert the roster if it has never been seeded.
    ///
    /// Ids are assigned from 1 in the given order. Returns the number of
    /// candidates inserted, 0 when a roster already exists.
    pub fn seed(&self, names: &[String]) -> Result<usize, RegistryError> {
        let candidates = self.store.candidates();
        let meta = self.store.meta();

        let result: Result<usize, TransactionError<Infallible>> =
            (candidates, meta).transaction(|(candidates, meta)| {
                if meta.get(keys::CANDIDATES_SEEDED)?.is_some() {
                    return Ok(0);
                }
                let mut inserted = 0;
                for (offset, name) in names.iter().enumerate() {
                    let id = offset as u64 + 1;
                    if candidates
                        .insert(name.as_bytes(), id.to_be_bytes().to_vec())?
                        .is_none()
                    {
                        inserted += 1;
                    }
                }
                meta.insert(keys::CANDIDATES_SEEDED, b"1".to_vec())?;
                Ok(inserted)
            });

        let inserted = result.map_err(|e| match e {
            TransactionError::Abort(never) => match never {},
            TransactionError::Storage(e) => RegistryError::from(e),
        })?;

        if inserted > 0 {
            info!(count = inserted, "Candidates seeded");
        }
        Ok(inserted)
    }

    /// Candidate names in lexicographic order
    pub fn names(&self) -> Result<Vec<String>, RegistryError> {
        Ok(self.list()?.into_iter().map(|c| c.name).collect())
    }

    /// All candidates in lexicographic name order
    pub fn list(&self) -> Result<Vec<Candidate>, RegistryError> {
        let mut out = Vec::new();
        for entry in self.store.candidates().iter() {
            let (key, value) = entry?;
            out.push(Candidate {
                id: decode_id(&value)?,
                name: decode_name(&key)?,
            });
        }
        Ok(out)
    }

    /// Check whether a candidate is on the roster
    pub fn contains(&self, name: &str) -> Result<bool, RegistryError> {
        Ok(self.store.candidates().contains_key(name.as_bytes())?)
    }

    pub fn len(&self) -> usize {
        self.store.candidates().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.candidates().is_empty()
    }
}

fn decode_id(bytes: &[u8]) -> Result<u64, StoreError> {
    <[u8; 8]>::try_from(bytes)
        .map(u64::from_be_bytes)
        .map_err(|_| {
            StoreError::DeserializationFailed(format!(
                "candidate id is {} bytes, expected 8",
                bytes.len()
            ))
        })
}

fn decode_name(bytes: &[u8]) -> Result<String, StoreError> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| StoreError::DeserializationFailed(format!("candidate name: {}", e)))
}
