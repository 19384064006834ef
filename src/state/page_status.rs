//! Page status definitions for tracking harvest progress
//!
//! A page moves `Pending -> InProgress` when a worker claims it, and then
//! `InProgress -> Done` or `InProgress -> Failed` when the outcome is recorded.
//! Failed pages may be claimed again until they run out of attempts.

use std::fmt;

/// Represents the current status of a page in the work queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageStatus {
    /// Discovered by the explorer, never claimed
    Pending,

    /// Claimed by a worker that has not recorded an outcome yet
    InProgress,

    /// Accepted and stored as a document
    Done,

    /// Last attempt was rejected or errored
    Failed,
}

impl PageStatus {
    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "done" => Some(Self::Done),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all page statuses
    pub fn all() -> [Self; 4] {
        [Self::Pending, Self::InProgress, Self::Done, Self::Failed]
    }
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
