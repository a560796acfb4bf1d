//! Fire-and-forget dispatch of new jobs to the worker.
//!
//! The intake handler spawns [`Dispatcher::trigger`] and returns without
//! awaiting it. The dispatcher re-reads the job first, so a trigger for a job
//! that already left `pending` does nothing. What happens when the worker
//! cannot be reached is decided by the configured
//! [`DispatchFailurePolicy`].

use std::sync::Arc;
use std::time::Duration;

use analysis_core::dispatch_policy::{retry_delay, DispatchFailurePolicy, DISPATCH_FAILED_MESSAGE};
use analysis_core::error::CoreError;
use analysis_core::types::JobId;
use analysis_db::models::job::{Job, JobUpdate};
use analysis_db::models::status::JobStatus;
use analysis_db::{JobStore, StoreError};
use analysis_worker::{JobProcessor, WorkerError};
use async_trait::async_trait;
use serde::Serialize;
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Worker request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Worker rejected trigger with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error(transparent)]
    Worker(#[from] WorkerError),
}

/// Something that can be asked to start processing a job.
#[async_trait]
pub trait WorkerClient: Send + Sync {
    fn name(&self) -> &'static str;

    /// Ask the worker to start `job_id`. Returns once the worker accepted it.
    async fn trigger(&self, job_id: JobId, dispatch_token: Uuid) -> Result<(), DispatchError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TriggerPayload {
    job_id: JobId,
    dispatch_token: Uuid,
}

/// Calls `POST {worker_url}/trigger` on the standalone worker.
pub struct HttpWorkerClient {
    client: reqwest::Client,
    trigger_url: String,
}

impl HttpWorkerClient {
    pub fn new(worker_url: &str, timeout: Duration) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            trigger_url: format!("{}/trigger", worker_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl WorkerClient for HttpWorkerClient {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn trigger(&self, job_id: JobId, dispatch_token: Uuid) -> Result<(), DispatchError> {
        let response = self
            .client
            .post(&self.trigger_url)
            .json(&TriggerPayload {
                job_id,
                dispatch_token,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// Runs the worker's processor on a task inside the API process.
pub struct InProcessWorkerClient {
    processor: Arc<JobProcessor>,
}

impl InProcessWorkerClient {
    pub fn new(processor: Arc<JobProcessor>) -> Self {
        Self { processor }
    }
}

#[async_trait]
impl WorkerClient for InProcessWorkerClient {
    fn name(&self) -> &'static str {
        "in_process"
    }

    async fn trigger(&self, job_id: JobId, dispatch_token: Uuid) -> Result<(), DispatchError> {
        self.processor.verify_trigger(job_id, dispatch_token).await?;

        let processor = Arc::clone(&self.processor);
        tokio::spawn(async move {
            match processor.process(job_id).await {
                Ok(outcome) => tracing::debug!(job_id = %job_id, ?outcome, "Processing finished"),
                Err(e) => tracing::error!(job_id = %job_id, error = %e, "Processing failed"),
            }
        });
        Ok(())
    }
}

/// Result of one [`Dispatcher::trigger`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Dispatched,
    /// The job had already left `pending`.
    Skipped(JobStatus),
    NotFound,
    /// Every attempt failed; the job stays `pending`.
    Stalled,
    /// Every attempt failed and the job was moved to `error`.
    MarkedError,
}

pub struct Dispatcher {
    store: Arc<dyn JobStore>,
    client: Arc<dyn WorkerClient>,
    policy: DispatchFailurePolicy,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn JobStore>,
        client: Arc<dyn WorkerClient>,
        policy: DispatchFailurePolicy,
    ) -> Self {
        Self {
            store,
            client,
            policy,
        }
    }

    pub fn policy(&self) -> DispatchFailurePolicy {
        self.policy
    }

    /// Start [`trigger`](Self::trigger) on its own task. Callers do not await it.
    pub fn spawn_trigger(self: &Arc<Self>, job_id: JobId) -> JoinHandle<DispatchOutcome> {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move { dispatcher.trigger(job_id).await })
    }

    /// The job if it is still `pending`; otherwise the outcome to report.
    async fn pending_job(&self, job_id: JobId) -> Result<Job, DispatchOutcome> {
        match self.store.get(job_id).await {
            Ok(Some(job)) => match job.status() {
                Ok(JobStatus::Pending) => Ok(job),
                Ok(status) => {
                    tracing::debug!(job_id = %job_id, %status, "Job no longer pending, not dispatching");
                    Err(DispatchOutcome::Skipped(status))
                }
                Err(e) => {
                    tracing::error!(job_id = %job_id, error = %e, "Job has unknown status");
                    Err(DispatchOutcome::Stalled)
                }
            },
            Ok(None) => {
                tracing::warn!(job_id = %job_id, "Dispatch requested for unknown job");
                Err(DispatchOutcome::NotFound)
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Failed to load job for dispatch");
                Err(DispatchOutcome::Stalled)
            }
        }
    }

    /// Ask the worker to process `job_id`, applying the failure policy.
    ///
    /// Never returns an error: every failure is logged and folded into the
    /// outcome.
    pub async fn trigger(&self, job_id: JobId) -> DispatchOutcome {
        let attempts = 1 + self.policy.retry_attempts();
        let mut last_seen_version = None;

        for attempt in 0..attempts {
            let job = match self.pending_job(job_id).await {
                Ok(job) => job,
                Err(outcome) => return outcome,
            };
            last_seen_version = Some(job.version);

            match self.client.trigger(job_id, job.dispatch_token).await {
                Ok(()) => {
                    tracing::info!(job_id = %job_id, client = self.client.name(), "Job dispatched");
                    return DispatchOutcome::Dispatched;
                }
                Err(e) => {
                    tracing::warn!(
                        job_id = %job_id,
                        attempt = attempt + 1,
                        attempts,
                        error = %e,
                        "Dispatch attempt failed",
                    );
                    if attempt + 1 < attempts {
                        tokio::time::sleep(retry_delay(attempt)).await;
                    }
                }
            }
        }

        match (self.policy, last_seen_version) {
            (DispatchFailurePolicy::MarkError, Some(version)) => {
                self.mark_error(job_id, version).await
            }
            _ => {
                tracing::error!(job_id = %job_id, "Dispatch failed, job left pending");
                DispatchOutcome::Stalled
            }
        }
    }

    /// Fail the job unless it changed since the pending read at `version`.
    /// A trigger reported as failed may still have reached the worker.
    async fn mark_error(&self, job_id: JobId, version: i32) -> DispatchOutcome {
        let update = JobUpdate::error(DISPATCH_FAILED_MESSAGE).with_expected_version(version);
        match self.store.update(job_id, &update).await {
            Ok(_) => {
                tracing::error!(job_id = %job_id, "Dispatch failed, job marked as error");
                DispatchOutcome::MarkedError
            }
            Err(StoreError::Core(CoreError::InvalidTransition { from, .. })) => {
                tracing::info!(job_id = %job_id, status = %from, "Job moved on before it could be failed");
                DispatchOutcome::Skipped(from)
            }
            Err(StoreError::VersionConflict { .. }) => match self.pending_job(job_id).await {
                Ok(_) => {
                    tracing::warn!(job_id = %job_id, "Job changed while still pending, leaving it");
                    DispatchOutcome::Stalled
                }
                Err(outcome) => {
                    tracing::info!(job_id = %job_id, ?outcome, "Worker took the job despite the failed trigger");
                    outcome
                }
            },
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Failed to record dispatch failure");
                DispatchOutcome::Stalled
            }
        }
    }
}
