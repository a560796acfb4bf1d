//! Job entity model, DTOs, and the update validation shared by all stores.

use analysis_core::error::CoreError;
use analysis_core::job_status::validate_transition;
use analysis_core::job_type::JobType;
use analysis_core::types::{JobId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use super::status::{JobStatus, StatusId};
use crate::error::StoreError;

/// A row from the `jobs` table.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Job {
    pub id: JobId,
    pub job_type: String,
    pub status_id: StatusId,
    pub input_file_path: Option<String>,
    pub result: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub progress: Option<i16>,
    pub column_config: Option<serde_json::Value>,
    pub dispatch_token: Uuid,
    pub version: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Job {
    pub fn status(&self) -> Result<JobStatus, CoreError> {
        JobStatus::from_id(self.status_id)
    }

    pub fn job_type(&self) -> Result<JobType, CoreError> {
        JobType::from_name(&self.job_type)
    }

    /// Project the row into the polling response.
    pub fn status_view(&self) -> Result<JobStatusView, CoreError> {
        Ok(JobStatusView {
            job_id: self.id,
            status: self.status()?,
            result: self.result.clone(),
            error: self.error_message.clone(),
            progress: self.progress,
        })
    }
}

/// DTO for inserting a new pending job.
#[derive(Debug, Clone)]
pub struct CreateJob {
    pub job_type: JobType,
    pub input_file_path: String,
    pub column_config: Option<serde_json::Value>,
}

/// Partial update applied through [`JobStore::update`](crate::store::JobStore::update).
///
/// Every store validates the update against the current row before writing:
/// the status move must follow the transition table, `result` travels only
/// with `done`, `error_message` only with `error`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub result: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub progress: Option<i16>,
    /// Null out `input_file_path` (only after the artifact is deleted).
    pub clear_input_file: bool,
    /// Reject the write unless the row is still at this version.
    pub expected_version: Option<i32>,
}

impl JobUpdate {
    pub fn running() -> Self {
        Self {
            status: Some(JobStatus::Running),
            ..Self::default()
        }
    }

    pub fn done(result: serde_json::Value) -> Self {
        Self {
            status: Some(JobStatus::Done),
            result: Some(result),
            progress: Some(100),
            ..Self::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Error),
            error_message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn progress(percent: i16) -> Self {
        Self {
            progress: Some(percent),
            ..Self::default()
        }
    }

    pub fn clear_input_file() -> Self {
        Self {
            clear_input_file: true,
            ..Self::default()
        }
    }

    pub fn with_expected_version(mut self, version: i32) -> Self {
        self.expected_version = Some(version);
        self
    }

    fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.result.is_none()
            && self.error_message.is_none()
            && self.progress.is_none()
            && !self.clear_input_file
    }

    /// Validate this update against a job currently in `current`.
    pub fn validate(&self, current: JobStatus) -> Result<(), CoreError> {
        if self.is_empty() {
            return Err(CoreError::Validation("Job update changes nothing".into()));
        }

        if let Some(next) = self.status {
            validate_transition(current, next)?;
        }

        match (self.status, self.result.is_some()) {
            (Some(JobStatus::Done), false) => {
                return Err(CoreError::Validation(
                    "A job can only move to 'done' with a result".into(),
                ))
            }
            (status, true) if status != Some(JobStatus::Done) => {
                return Err(CoreError::Validation(
                    "A result can only be stored when moving to 'done'".into(),
                ))
            }
            _ => {}
        }

        match (self.status, self.error_message.is_some()) {
            (Some(JobStatus::Error), false) => {
                return Err(CoreError::Validation(
                    "A job can only move to 'error' with an error message".into(),
                ))
            }
            (status, true) if status != Some(JobStatus::Error) => {
                return Err(CoreError::Validation(
                    "An error message can only be stored when moving to 'error'".into(),
                ))
            }
            _ => {}
        }

        if let Some(progress) = self.progress {
            if !(0..=100).contains(&progress) {
                return Err(CoreError::Validation(format!(
                    "Progress must be between 0 and 100 (got {progress})"
                )));
            }
        }

        Ok(())
    }
}

/// Check version and transition rules of `update` against the stored row.
pub fn check_update(current: &Job, update: &JobUpdate) -> Result<(), StoreError> {
    if let Some(expected) = update.expected_version {
        if expected != current.version {
            return Err(StoreError::VersionConflict {
                id: current.id,
                expected,
                actual: current.version,
            });
        }
    }
    update.validate(current.status()?)?;
    Ok(())
}

/// Response for `GET /api/v1/jobs/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusView {
    pub job_id: JobId,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<i16>,
}
