// Storage module - PERSISTENCE
// sled-backed trees and the transaction scope shared by ledger and registry

mod scope;
mod store;

pub(crate) use store::keys;
pub use scope::{CommitAbort, CommitScope};
pub use store::{BallotStore, StorageStats, StoreError};
