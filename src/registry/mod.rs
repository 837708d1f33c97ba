// Registry module - WHO MAY VOTE, AND FOR WHOM
// Voter eligibility, passcode digests, and the candidate roster

mod candidate;
mod passcode;
mod voter;

pub use candidate::{Candidate, CandidateRoster};
pub use passcode::{PasscodeError, PasscodeHash, PasscodeParams};
pub use voter::{AuthResult, RegistryError, VoterRegistry, VoterStatus};
