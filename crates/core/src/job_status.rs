//! Job lifecycle states and the forward-only transition table.
//!
//! The discriminants match the seed data in the `job_statuses` lookup table.
//! Transition rules:
//! - `pending` -> `running`, or `error` when the job never reached a worker
//! - `running` -> `done`, `error`
//! - `done`, `error` -> (terminal)

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Status ID type matching SMALLINT in the database.
pub type StatusId = i16;

/// Background job execution status.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending = 1,
    Running = 2,
    Done = 3,
    Error = 4,
}

/// All statuses in lifecycle order.
pub const ALL_STATUSES: [JobStatus; 4] = [
    JobStatus::Pending,
    JobStatus::Running,
    JobStatus::Done,
    JobStatus::Error,
];

impl JobStatus {
    /// Return the database status ID.
    pub fn id(self) -> StatusId {
        self as StatusId
    }

    /// Map a database status ID back to a status.
    pub fn from_id(id: StatusId) -> Result<Self, CoreError> {
        ALL_STATUSES
            .into_iter()
            .find(|s| s.id() == id)
            .ok_or_else(|| CoreError::Validation(format!("Unknown job status id {id}")))
    }

    /// Parse from the lowercase wire/database name.
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        ALL_STATUSES
            .into_iter()
            .find(|s| s.as_str() == name)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Invalid job status '{name}'. Must be one of: pending, running, done, error"
                ))
            })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Done => "done",
            Self::Error => "error",
        }
    }

    /// Position in the lifecycle. `done` and `error` share the final rank.
    pub fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Running => 1,
            Self::Done | Self::Error => 2,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }

    /// Statuses this status may move to.
    pub fn valid_transitions(self) -> &'static [JobStatus] {
        match self {
            Self::Pending => &[Self::Running, Self::Error],
            Self::Running => &[Self::Done, Self::Error],
            Self::Done | Self::Error => &[],
        }
    }

    /// Statuses that may move to this status.
    pub fn predecessors(self) -> &'static [JobStatus] {
        match self {
            Self::Pending => &[],
            Self::Running => &[Self::Pending],
            Self::Done => &[Self::Running],
            Self::Error => &[Self::Pending, Self::Running],
        }
    }

    pub fn can_transition_to(self, next: JobStatus) -> bool {
        self.valid_transitions().contains(&next)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validate that a status transition from `current` to `next` is allowed.
pub fn validate_transition(current: JobStatus, next: JobStatus) -> Result<(), CoreError> {
    if current.can_transition_to(next) {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition {
            from: current,
            to: next,
        })
    }
}
