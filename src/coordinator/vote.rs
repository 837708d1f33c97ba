// Vote request, phases and outcomes

use crate::chain::Block;
use crate::registry::AuthResult;
use serde::Serialize;
use std::fmt;

/// A request to cast one vote
#[derive(Clone)]
pub struct VoteRequest {
    pub usercode: String,
    pub passcode: String,
    pub candidate: String,
}

impl VoteRequest {
    pub fn new(usercode: &str, passcode: &str, candidate: &str) -> Self {
        Self {
            usercode: usercode.to_string(),
            passcode: passcode.to_string(),
            candidate: candidate.to_string(),
        }
    }

    /// Check that every field is present
    pub fn is_complete(&self) -> bool {
        !self.usercode.is_empty() && !self.passcode.is_empty() && !self.candidate.is_empty()
    }
}

impl fmt::Debug for VoteRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoteRequest")
            .field("usercode", &self.usercode)
            .field("passcode", &"[redacted]")
            .field("candidate", &self.candidate)
            .finish()
    }
}

/// Why a vote was not recorded
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RejectReason {
    /// Usercode, passcode or candidate missing
    InputMissing,
    UserNotFound,
    WrongPasscode,
    /// Voter already has a committed vote, or one in flight
    AlreadyVoted,
    UnknownCandidate,
    /// Append kept conflicting until the retry bound
    Busy,
}

impl RejectReason {
    /// Map a failed authentication to a rejection; `None` for `AuthResult::Ok`
    pub fn from_auth(result: AuthResult) -> Option<Self> {
        match result {
            AuthResult::Ok => None,
            AuthResult::NotFound => Some(RejectReason::UserNotFound),
            AuthResult::WrongPasscode => Some(RejectReason::WrongPasscode),
            AuthResult::AlreadyVoted => Some(RejectReason::AlreadyVoted),
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RejectReason::InputMissing => "usercode, passcode and candidate are required",
            RejectReason::UserNotFound => "user not found",
            RejectReason::WrongPasscode => "invalid passcode",
            RejectReason::AlreadyVoted => "this user has already voted",
            RejectReason::UnknownCandidate => "unknown candidate",
            RejectReason::Busy => "ledger busy, try again",
        };
        f.write_str(text)
    }
}

/// Result of a vote request
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum VoteOutcome {
    Committed { block: Block },
    Rejected { reason: RejectReason },
}

impl VoteOutcome {
    pub fn rejected(reason: RejectReason) -> Self {
        VoteOutcome::Rejected { reason }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, VoteOutcome::Committed { .. })
    }

    /// The appended block, if committed
    pub fn block(&self) -> Option<&Block> {
        match self {
            VoteOutcome::Committed { block } => Some(block),
            VoteOutcome::Rejected { .. } => None,
        }
    }

    /// The rejection reason, if rejected
    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            VoteOutcome::Committed { .. } => None,
            VoteOutcome::Rejected { reason } => Some(*reason),
        }
    }
}

/// Lifecycle of a single vote request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VotePhase {
    Idle,
    Validating,
    Appending,
    Committed,
    Rejected,
}

impl VotePhase {
    /// Check whether `next` is a legal successor of this phase.
    ///
    /// `Appending -> Appending` is a retry after an append conflict.
    pub fn can_advance_to(self, next: VotePhase) -> bool {
        use VotePhase::*;
        matches!(
            (self, next),
            (Idle, Validating)
                | (Idle, Rejected)
                | (Validating, Appending)
                | (Validating, Rejected)
                | (Appending, Appending)
                | (Appending, Committed)
                | (Appending, Rejected)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, VotePhase::Committed | VotePhase::Rejected)
    }
}
