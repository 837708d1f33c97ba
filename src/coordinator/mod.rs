// Coordinator module - THE COMMIT PROTOCOL
// Turns a vote request into exactly one block and one voted flag, or neither

mod commit;
mod in_flight;
mod vote;

pub use commit::{CoordinatorError, VoteCoordinator};
pub use in_flight::{InFlightGuard, InFlightVotes};
pub use vote::{RejectReason, VoteOutcome, VotePhase, VoteRequest};
