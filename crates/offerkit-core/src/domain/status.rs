//! Element status and the parent reduction rule.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Status of a plan element.
///
/// `Pending -> Prepared -> InProgress -> Complete`, plus `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Pending,
    Prepared,
    InProgress,
    Complete,
    Error,
}

impl Status {
    pub fn is_complete(self) -> bool {
        self == Status::Complete
    }

    /// Reduces children statuses into the parent's.
    ///
    /// # Design
    /// - COMPLETE iff every child is COMPLETE (an empty parent is COMPLETE)
    /// - else ERROR if any child is ERROR
    /// - else IN_PROGRESS if any child has left PENDING
    /// - else PENDING
    pub fn reduce<I>(children: I) -> Status
    where
        I: IntoIterator<Item = Status>,
    {
        let mut all_complete = true;
        let mut any_error = false;
        let mut any_started = false;
        for status in children {
            all_complete &= status == Status::Complete;
            any_error |= status == Status::Error;
            any_started |= status != Status::Pending;
        }
        if all_complete {
            Status::Complete
        } else if any_error {
            Status::Error
        } else if any_started {
            Status::InProgress
        } else {
            Status::Pending
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Pending => "PENDING",
            Status::Prepared => "PREPARED",
            Status::InProgress => "IN_PROGRESS",
            Status::Complete => "COMPLETE",
            Status::Error => "ERROR",
        };
        f.write_str(s)
    }
}
