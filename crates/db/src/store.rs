//! The job store abstraction used by the API server and the worker.

use analysis_core::job_type::JobType;
use analysis_core::types::{JobId, Timestamp};
use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::job::{CreateJob, Job, JobUpdate};
use crate::models::status::JobStatus;
use crate::repositories::JobRepo;
use crate::DbPool;

/// Durable record of jobs; the single source of truth for job state.
///
/// Every backend enforces the same rules on [`update`](JobStore::update):
/// forward-only transitions, field invariants, and the optional expected
/// version.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a pending job without a quota check.
    async fn create(&self, input: &CreateJob) -> Result<Job, StoreError>;

    /// Insert a pending job only if fewer than `limit` jobs exist since `since`.
    ///
    /// Fails with `CoreError::RateLimited` when the quota is exhausted.
    async fn create_within_quota(
        &self,
        input: &CreateJob,
        since: Timestamp,
        limit: i64,
    ) -> Result<Job, StoreError>;

    async fn get(&self, id: JobId) -> Result<Option<Job>, StoreError>;

    /// Guarded partial update. Returns the row as written.
    async fn update(&self, id: JobId, update: &JobUpdate) -> Result<Job, StoreError>;

    /// Jobs created at or after `since`, optionally filtered by type.
    async fn count(&self, job_type: Option<JobType>, since: Timestamp) -> Result<i64, StoreError>;

    /// Jobs in `status` whose `updated_at` is older than `updated_before`.
    async fn list_stale(
        &self,
        status: JobStatus,
        updated_before: Timestamp,
        limit: i64,
    ) -> Result<Vec<Job>, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

/// PostgreSQL-backed store delegating to [`JobRepo`].
#[derive(Clone)]
pub struct PgJobStore {
    pool: DbPool,
}

impl PgJobStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create(&self, input: &CreateJob) -> Result<Job, StoreError> {
        Ok(JobRepo::create(&self.pool, input).await?)
    }

    async fn create_within_quota(
        &self,
        input: &CreateJob,
        since: Timestamp,
        limit: i64,
    ) -> Result<Job, StoreError> {
        JobRepo::create_within_quota(&self.pool, input, since, limit).await
    }

    async fn get(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        Ok(JobRepo::find_by_id(&self.pool, id).await?)
    }

    async fn update(&self, id: JobId, update: &JobUpdate) -> Result<Job, StoreError> {
        JobRepo::update(&self.pool, id, update).await
    }

    async fn count(&self, job_type: Option<JobType>, since: Timestamp) -> Result<i64, StoreError> {
        Ok(JobRepo::count_since(&self.pool, job_type, since).await?)
    }

    async fn list_stale(
        &self,
        status: JobStatus,
        updated_before: Timestamp,
        limit: i64,
    ) -> Result<Vec<Job>, StoreError> {
        Ok(JobRepo::list_stale(&self.pool, status, updated_before, limit).await?)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(crate::health_check(&self.pool).await?)
    }
}
