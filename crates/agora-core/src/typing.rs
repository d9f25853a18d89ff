//! Remote typing indicators.
//!
//! A user is shown as typing from the moment a start event arrives until a
//! stop event arrives or [`TYPING_EXPIRY`] passes without a fresh start,
//! whichever comes first. Each user owns exactly one deadline; a repeated
//! start moves it rather than adding another, so the number of pending
//! timers never exceeds the number of users shown.

use std::time::Duration;

use crate::env::Moment;

/// How long a start event keeps a user in the typing set.
pub const TYPING_EXPIRY: Duration = Duration::from_secs(3);

/// Set of users currently typing, in the order they started.
#[derive(Debug, Clone)]
pub struct TypingTracker<I: Moment> {
    entries: Vec<(String, I)>,
}

impl<I: Moment> Default for TypingTracker<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: Moment> TypingTracker<I> {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Record a start event. Returns true if the set changed.
    ///
    /// A user already in the set keeps their position and has their deadline
    /// pushed to `now + TYPING_EXPIRY`.
    pub fn start(&mut self, username: &str, now: I) -> bool {
        let deadline = now + TYPING_EXPIRY;

        if let Some(entry) = self.entries.iter_mut().find(|(name, _)| name == username) {
            entry.1 = deadline;
            return false;
        }

        self.entries.push((username.to_string(), deadline));
        true
    }

    /// Record a stop event. Returns true if the user was in the set.
    pub fn stop(&mut self, username: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(name, _)| name != username);
        self.entries.len() != before
    }

    /// Remove every user whose deadline has passed and return them.
    pub fn expire(&mut self, now: I) -> Vec<String> {
        let mut expired = Vec::new();
        self.entries.retain(|(name, deadline)| {
            if now >= *deadline {
                expired.push(name.clone());
                false
            } else {
                true
            }
        });
        expired
    }

    /// Users currently typing, in start order.
    pub fn users(&self) -> Vec<String> {
        self.entries.iter().map(|(name, _)| name.clone()).collect()
    }

    /// True if `username` is in the set.
    pub fn contains(&self, username: &str) -> bool {
        self.entries.iter().any(|(name, _)| name == username)
    }

    /// True if nobody is typing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Earliest pending deadline. The set next changes on its own at this
    /// instant, so an owner sleeping between ticks wakes no later than this.
    pub fn next_deadline(&self) -> Option<I> {
        self.entries.iter().map(|(_, deadline)| *deadline).min()
    }

    /// Number of outstanding expiry timers.
    pub fn pending_timers(&self) -> usize {
        self.entries.len()
    }

    /// Drop every entry and its timer. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }
}
