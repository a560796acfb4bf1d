//! What happens when the worker cannot be reached.
//!
//! The dispatcher never surfaces a failure to the uploader. The policy only
//! decides what the job record looks like afterwards.

use std::time::Duration;

use crate::error::CoreError;

/// Base delay for the first dispatch retry.
pub const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Upper bound on any single retry delay.
pub const RETRY_MAX_DELAY: Duration = Duration::from_secs(30);

/// Message stored on a job failed by [`DispatchFailurePolicy::MarkError`].
pub const DISPATCH_FAILED_MESSAGE: &str = "Failed to dispatch job to worker";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DispatchFailurePolicy {
    /// Log and leave the job pending.
    #[default]
    Stall,
    /// Move the job to `error` with [`DISPATCH_FAILED_MESSAGE`].
    MarkError,
    /// Retry up to `attempts` more times, then behave like `Stall`.
    Retry { attempts: u32 },
}

impl DispatchFailurePolicy {
    /// Parse `stall`, `mark_error` or `retry:N`.
    pub fn from_name(value: &str) -> Result<Self, CoreError> {
        match value.trim() {
            "stall" => Ok(Self::Stall),
            "mark_error" => Ok(Self::MarkError),
            other => other
                .strip_prefix("retry:")
                .and_then(|n| n.parse::<u32>().ok())
                .map(|attempts| Self::Retry { attempts })
                .ok_or_else(|| {
                    CoreError::Validation(format!(
                        "Invalid dispatch failure policy '{other}'. Expected stall, mark_error or retry:N"
                    ))
                }),
        }
    }

    /// Number of extra attempts after the first call fails.
    pub fn retry_attempts(self) -> u32 {
        match self {
            Self::Retry { attempts } => attempts,
            Self::Stall | Self::MarkError => 0,
        }
    }
}

/// Exponential backoff: 500ms, 1s, 2s, ... capped at [`RETRY_MAX_DELAY`].
pub fn retry_delay(attempt: u32) -> Duration {
    RETRY_BASE_DELAY
        .saturating_mul(2u32.saturating_pow(attempt))
        .min(RETRY_MAX_DELAY)
}

/// What the reconciliation sweep does with a job stuck at `pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StalePendingAction {
    Redispatch,
    MarkError,
}

impl StalePendingAction {
    pub fn from_name(value: &str) -> Result<Self, CoreError> {
        match value.trim() {
            "redispatch" => Ok(Self::Redispatch),
            "mark_error" => Ok(Self::MarkError),
            other => Err(CoreError::Validation(format!(
                "Invalid stale pending action '{other}'. Expected redispatch or mark_error"
            ))),
        }
    }
}
