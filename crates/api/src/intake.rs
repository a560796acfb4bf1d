//! Intake gateway: validate an upload, store it, record a pending job, and
//! hand the job to the dispatcher without waiting.

use std::sync::Arc;

use analysis_core::intake::{check_daily_quota, start_of_day, validate_upload_size, verify_credential};
use analysis_core::job_type::JobType;
use analysis_core::types::JobId;
use analysis_db::models::job::CreateJob;
use analysis_db::JobStore;
use analysis_storage::ArtifactManager;
use chrono::Utc;
use serde::Serialize;

use crate::config::IntakeConfig;
use crate::engine::dispatcher::Dispatcher;
use crate::error::{AppError, AppResult};

/// One upload as received from the client.
#[derive(Debug, Clone)]
pub struct IntakeRequest {
    pub bytes: Vec<u8>,
    pub original_name: String,
    pub job_type: String,
    pub credential: Option<String>,
    pub column_config: Option<serde_json::Value>,
}

/// Returned to the client as soon as the job is recorded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeReceipt {
    pub job_id: JobId,
    pub path: String,
}

pub struct IntakeGateway {
    store: Arc<dyn JobStore>,
    artifacts: ArtifactManager,
    dispatcher: Arc<Dispatcher>,
    limits: IntakeConfig,
}

impl IntakeGateway {
    pub fn new(
        store: Arc<dyn JobStore>,
        artifacts: ArtifactManager,
        dispatcher: Arc<Dispatcher>,
        limits: IntakeConfig,
    ) -> Self {
        Self {
            store,
            artifacts,
            dispatcher,
            limits,
        }
    }

    pub fn limits(&self) -> &IntakeConfig {
        &self.limits
    }

    /// Accept an upload.
    ///
    /// Checks run in order: credential (401), job type (400), size (413),
    /// daily quota (429). The artifact is then written and the job inserted
    /// under an atomic quota check; if the insert fails the artifact is
    /// deleted again. Dispatch is spawned and never awaited.
    pub async fn submit(&self, request: IntakeRequest) -> AppResult<IntakeReceipt> {
        verify_credential(request.credential.as_deref(), &self.limits.secret)?;

        let job_type = JobType::from_name(&request.job_type)?;
        validate_upload_size(request.bytes.len() as u64, self.limits.max_upload_bytes)?;

        // Cheap rejection before any bytes are written.
        let since = start_of_day(Utc::now());
        let created_today = self.store.count(None, since).await?;
        check_daily_quota(created_today, self.limits.max_daily_jobs)?;

        let path = self
            .artifacts
            .write(job_type, &request.original_name, request.bytes)
            .await
            .map_err(AppError::Upload)?;

        let input = CreateJob {
            job_type,
            input_file_path: path.clone(),
            column_config: request.column_config,
        };
        let job = match self
            .store
            .create_within_quota(&input, since, self.limits.max_daily_jobs)
            .await
        {
            Ok(job) => job,
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "Job insert failed, removing artifact");
                self.artifacts.delete(&path).await;
                return Err(e.into());
            }
        };

        tracing::info!(job_id = %job.id, job_type = %job_type, path = %path, "Job created");
        self.dispatcher.spawn_trigger(job.id);

        Ok(IntakeReceipt {
            job_id: job.id,
            path,
        })
    }
}
