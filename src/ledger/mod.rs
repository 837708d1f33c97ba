// Ledger module - THE CHAIN OF RECORD
// Append-only block storage with optimistic tip checks and integrity halts

mod store;

pub use store::{LedgerError, LedgerStore};
