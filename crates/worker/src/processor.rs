//! Drives one job through `pending -> running -> done | error`.

use std::sync::Arc;

use analysis_core::error::CoreError;
use analysis_core::types::JobId;
use analysis_db::models::job::{Job, JobUpdate};
use analysis_db::models::status::JobStatus;
use analysis_db::{JobStore, StoreError};
use analysis_storage::ArtifactManager;
use uuid::Uuid;

use crate::analysis::run_analysis;
use crate::error::WorkerError;

/// Error message recorded when the artifact cannot be read.
pub const LOAD_FAILED_MESSAGE: &str = "Failed to download file";

/// How a single processing attempt ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    /// Result stored; `artifact_cleared` is false when the delete failed.
    Completed { artifact_cleared: bool },
    /// The job was moved to `error` with this message.
    Failed(String),
    /// Another invocation owns the job or it already finished.
    Skipped(JobStatus),
}

#[derive(Clone)]
pub struct JobProcessor {
    store: Arc<dyn JobStore>,
    artifacts: ArtifactManager,
}

impl JobProcessor {
    pub fn new(store: Arc<dyn JobStore>, artifacts: ArtifactManager) -> Self {
        Self { store, artifacts }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    async fn load(&self, job_id: JobId) -> Result<Job, WorkerError> {
        self.store
            .get(job_id)
            .await?
            .ok_or(WorkerError::JobNotFound(job_id))
    }

    /// Check that `token` is the dispatch token issued for the job.
    pub async fn verify_trigger(&self, job_id: JobId, token: Uuid) -> Result<Job, WorkerError> {
        let job = self.load(job_id).await?;
        if job.dispatch_token != token {
            return Err(WorkerError::TokenMismatch(job_id));
        }
        Ok(job)
    }

    /// Process a job end to end.
    ///
    /// Load and compute failures are recorded on the job and reported as
    /// [`ProcessOutcome::Failed`]; only store failures surface as errors.
    pub async fn process(&self, job_id: JobId) -> Result<ProcessOutcome, WorkerError> {
        let job = self.load(job_id).await?;

        let claim = JobUpdate::running().with_expected_version(job.version);
        let job = match self.store.update(job_id, &claim).await {
            Ok(job) => job,
            Err(StoreError::Core(CoreError::InvalidTransition { from, .. })) => {
                tracing::info!(job_id = %job_id, status = %from, "Job already claimed, skipping");
                return Ok(ProcessOutcome::Skipped(from));
            }
            Err(StoreError::VersionConflict { .. }) => {
                let current = self.load(job_id).await?.status().map_err(StoreError::from)?;
                tracing::info!(job_id = %job_id, status = %current, "Lost claim race, skipping");
                return Ok(ProcessOutcome::Skipped(current));
            }
            Err(e) => return Err(e.into()),
        };
        tracing::info!(job_id = %job_id, job_type = %job.job_type, "Job claimed");

        let Some(path) = job.input_file_path.clone() else {
            tracing::warn!(job_id = %job_id, "Job has no artifact reference");
            return self.fail(job_id, LOAD_FAILED_MESSAGE).await;
        };

        let bytes = match self.artifacts.read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(job_id = %job_id, path = %path, error = %e, "Failed to load artifact");
                return self.fail(job_id, LOAD_FAILED_MESSAGE).await;
            }
        };

        let outcome = job
            .job_type()
            .map_err(|e| WorkerError::Compute(e.to_string()))
            .and_then(|job_type| run_analysis(job_type, &bytes, job.column_config.as_ref()));

        let result = match outcome {
            Ok(result) => result,
            Err(WorkerError::Compute(message)) => {
                tracing::warn!(job_id = %job_id, error = %message, "Computation failed");
                return self.fail(job_id, &message).await;
            }
            Err(e) => return Err(e),
        };

        self.complete(job_id, result, &path).await
    }

    /// Record a result, delete the artifact, and clear the reference if the
    /// delete went through.
    ///
    /// When the job was already failed elsewhere (the stale-running sweep),
    /// the result is dropped but the artifact is still released.
    pub async fn complete(
        &self,
        job_id: JobId,
        result: serde_json::Value,
        artifact_path: &str,
    ) -> Result<ProcessOutcome, WorkerError> {
        match self.store.update(job_id, &JobUpdate::done(result)).await {
            Ok(_) => {}
            Err(StoreError::Core(CoreError::InvalidTransition { from, .. })) => {
                tracing::warn!(job_id = %job_id, status = %from, "Job finished elsewhere, releasing artifact");
                self.release(job_id, artifact_path).await;
                return Ok(ProcessOutcome::Skipped(from));
            }
            Err(e) => return Err(e.into()),
        }
        tracing::info!(job_id = %job_id, "Job completed");

        let artifact_cleared = if self.artifacts.delete(artifact_path).await {
            self.store
                .update(job_id, &JobUpdate::clear_input_file())
                .await?;
            true
        } else {
            false
        };

        Ok(ProcessOutcome::Completed { artifact_cleared })
    }

    /// Best-effort artifact cleanup for a job this invocation no longer owns.
    async fn release(&self, job_id: JobId, artifact_path: &str) {
        if !self.artifacts.delete(artifact_path).await {
            return;
        }
        if let Err(e) = self
            .store
            .update(job_id, &JobUpdate::clear_input_file())
            .await
        {
            tracing::warn!(job_id = %job_id, error = %e, "Failed to clear artifact reference");
        }
    }

    /// Mark the job failed. The artifact is kept so the upload can be
    /// inspected or resubmitted.
    async fn fail(&self, job_id: JobId, message: &str) -> Result<ProcessOutcome, WorkerError> {
        self.store.update(job_id, &JobUpdate::error(message)).await?;
        tracing::info!(job_id = %job_id, error = %message, "Job marked as error");
        Ok(ProcessOutcome::Failed(message.to_string()))
    }
}
