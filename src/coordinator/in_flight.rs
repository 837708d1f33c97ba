// In-flight guard - at most one open vote transaction per usercode

use std::collections::HashSet;
use std::sync::Mutex;

/// Set of usercodes with a vote transaction currently open
#[derive(Debug, Default)]
pub struct InFlightVotes {
    active: Mutex<HashSet<String>>,
}

impl InFlightVotes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `usercode`; `None` if another transaction already holds it
    pub fn try_acquire(&self, usercode: &str) -> Option<InFlightGuard<'_>> {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if !active.insert(usercode.to_string()) {
            return None;
        }
        Some(InFlightGuard {
            owner: self,
            usercode: usercode.to_string(),
        })
    }

    /// Check whether `usercode` is currently claimed
    pub fn contains(&self, usercode: &str) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(usercode)
    }

    pub fn len(&self) -> usize {
        self.active.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Releases the usercode claim on drop
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    owner: &'a InFlightVotes,
    usercode: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.owner
            .active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.usercode);
    }
}
