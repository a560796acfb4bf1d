//! In-process job store with the same semantics as the Postgres backend.
//!
//! Used for single-process local runs (`JOB_STORE_BACKEND=memory`) and in
//! tests. Contents are lost on restart.

use std::collections::HashMap;

use analysis_core::error::CoreError;
use analysis_core::intake::check_daily_quota;
use analysis_core::job_type::JobType;
use analysis_core::types::{JobId, Timestamp};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::job::{check_update, CreateJob, Job, JobUpdate};
use crate::models::status::JobStatus;
use crate::store::JobStore;

#[derive(Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<JobId, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn new_row(input: &CreateJob) -> Job {
        let now = Utc::now();
        Job {
            id: Uuid::now_v7(),
            job_type: input.job_type.as_str().to_string(),
            status_id: JobStatus::Pending.id(),
            input_file_path: Some(input.input_file_path.clone()),
            result: None,
            error_message: None,
            progress: None,
            column_config: input.column_config.clone(),
            dispatch_token: Uuid::new_v4(),
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    fn count_locked(jobs: &HashMap<JobId, Job>, job_type: Option<JobType>, since: Timestamp) -> i64 {
        jobs.values()
            .filter(|j| j.created_at >= since)
            .filter(|j| job_type.map_or(true, |t| j.job_type == t.as_str()))
            .count() as i64
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, input: &CreateJob) -> Result<Job, StoreError> {
        let job = Self::new_row(input);
        self.jobs.lock().await.insert(job.id, job.clone());
        Ok(job)
    }

    async fn create_within_quota(
        &self,
        input: &CreateJob,
        since: Timestamp,
        limit: i64,
    ) -> Result<Job, StoreError> {
        let mut jobs = self.jobs.lock().await;
        check_daily_quota(Self::count_locked(&jobs, None, since), limit)?;
        let job = Self::new_row(input);
        jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        Ok(self.jobs.lock().await.get(&id).cloned())
    }

    async fn update(&self, id: JobId, update: &JobUpdate) -> Result<Job, StoreError> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs
            .get_mut(&id)
            .ok_or(CoreError::NotFound { entity: "Job", id })?;

        check_update(job, update)?;

        if let Some(status) = update.status {
            job.status_id = status.id();
        }
        if let Some(result) = &update.result {
            job.result = Some(result.clone());
        }
        if let Some(message) = &update.error_message {
            job.error_message = Some(message.clone());
        }
        if let Some(progress) = update.progress {
            job.progress = Some(progress);
        }
        if update.clear_input_file {
            job.input_file_path = None;
        }
        job.version += 1;
        job.updated_at = Utc::now();

        Ok(job.clone())
    }

    async fn count(&self, job_type: Option<JobType>, since: Timestamp) -> Result<i64, StoreError> {
        Ok(Self::count_locked(&*self.jobs.lock().await, job_type, since))
    }

    async fn list_stale(
        &self,
        status: JobStatus,
        updated_before: Timestamp,
        limit: i64,
    ) -> Result<Vec<Job>, StoreError> {
        let jobs = self.jobs.lock().await;
        let mut stale: Vec<Job> = jobs
            .values()
            .filter(|j| j.status_id == status.id() && j.updated_at < updated_before)
            .cloned()
            .collect();
        stale.sort_by_key(|j| (j.updated_at, j.id));
        stale.truncate(limit.max(0) as usize);
        Ok(stale)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Duration;
    use serde_json::json;

    fn new_job(job_type: JobType) -> CreateJob {
        CreateJob {
            job_type,
            input_file_path: format!("{job_type}/1_data.csv"),
            column_config: None,
        }
    }

    fn day_start() -> Timestamp {
        analysis_core::intake::start_of_day(Utc::now())
    }

    #[tokio::test]
    async fn create_starts_pending_with_artifact() {
        let store = MemoryJobStore::new();
        let job = store.create(&new_job(JobType::SurvivalAnalysis)).await.unwrap();

        assert_eq!(job.status().unwrap(), JobStatus::Pending);
        assert_eq!(job.input_file_path.as_deref(), Some("survival_analysis/1_data.csv"));
        assert_eq!(job.version, 1);
        assert_eq!(store.get(job.id).await.unwrap(), Some(job));
    }

    #[tokio::test]
    async fn full_lifecycle_bumps_version() {
        let store = MemoryJobStore::new();
        let job = store.create(&new_job(JobType::NrrDecomposition)).await.unwrap();

        let running = store.update(job.id, &JobUpdate::running()).await.unwrap();
        assert_eq!(running.version, 2);
        let done = store
            .update(job.id, &JobUpdate::done(json!({"nrr": 1.12})))
            .await
            .unwrap();
        assert_eq!(done.status().unwrap(), JobStatus::Done);
        assert_eq!(done.result, Some(json!({"nrr": 1.12})));
        let cleaned = store
            .update(job.id, &JobUpdate::clear_input_file())
            .await
            .unwrap();
        assert!(cleaned.input_file_path.is_none());
        assert_eq!(cleaned.version, 4);
    }

    #[tokio::test]
    async fn backward_transition_rejected_and_row_untouched() {
        let store = MemoryJobStore::new();
        let job = store.create(&new_job(JobType::PropensityModel)).await.unwrap();
        store.update(job.id, &JobUpdate::running()).await.unwrap();
        let done = store.update(job.id, &JobUpdate::done(json!({}))).await.unwrap();

        let err = store.update(job.id, &JobUpdate::running()).await.unwrap_err();
        assert_matches!(
            err,
            StoreError::Core(CoreError::InvalidTransition {
                from: JobStatus::Done,
                to: JobStatus::Running
            })
        );
        assert_eq!(store.get(job.id).await.unwrap(), Some(done));
    }

    #[tokio::test]
    async fn stale_version_rejected() {
        let store = MemoryJobStore::new();
        let job = store.create(&new_job(JobType::PropensityModel)).await.unwrap();
        store.update(job.id, &JobUpdate::progress(10)).await.unwrap();

        let err = store
            .update(job.id, &JobUpdate::running().with_expected_version(job.version))
            .await
            .unwrap_err();
        assert_matches!(err, StoreError::VersionConflict { expected: 1, actual: 2, .. });
    }

    #[tokio::test]
    async fn duplicate_claim_loses() {
        let store = MemoryJobStore::new();
        let job = store.create(&new_job(JobType::SurvivalAnalysis)).await.unwrap();

        assert!(store.update(job.id, &JobUpdate::running()).await.is_ok());
        assert_matches!(
            store.update(job.id, &JobUpdate::running()).await,
            Err(StoreError::Core(CoreError::InvalidTransition { .. }))
        );
    }

    #[tokio::test]
    async fn update_unknown_job_is_not_found() {
        let store = MemoryJobStore::new();
        assert_matches!(
            store.update(Uuid::now_v7(), &JobUpdate::running()).await,
            Err(StoreError::Core(CoreError::NotFound { entity: "Job", .. }))
        );
    }

    #[tokio::test]
    async fn count_filters_by_type_and_time() {
        let store = MemoryJobStore::new();
        store.create(&new_job(JobType::SurvivalAnalysis)).await.unwrap();
        store.create(&new_job(JobType::SurvivalAnalysis)).await.unwrap();
        store.create(&new_job(JobType::NrrDecomposition)).await.unwrap();

        let since = day_start();
        assert_eq!(store.count(None, since).await.unwrap(), 3);
        assert_eq!(
            store.count(Some(JobType::SurvivalAnalysis), since).await.unwrap(),
            2
        );
        let future = Utc::now() + Duration::hours(1);
        assert_eq!(store.count(None, future).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn quota_insert_stops_at_limit() {
        let store = MemoryJobStore::new();
        let since = day_start();
        for _ in 0..3 {
            store
                .create_within_quota(&new_job(JobType::SurvivalAnalysis), since, 3)
                .await
                .unwrap();
        }
        assert_matches!(
            store
                .create_within_quota(&new_job(JobType::SurvivalAnalysis), since, 3)
                .await,
            Err(StoreError::Core(CoreError::RateLimited { limit: 3 }))
        );
        assert_eq!(store.count(None, since).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn concurrent_quota_inserts_never_overshoot() {
        let store = std::sync::Arc::new(MemoryJobStore::new());
        let since = day_start();
        let handles: Vec<_> = (0..20)
            .map(|_| {
                let store = std::sync::Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .create_within_quota(&new_job(JobType::PoissonFactorization), since, 5)
                        .await
                        .is_ok()
                })
            })
            .collect();

        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 5);
        assert_eq!(store.count(None, since).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn list_stale_returns_oldest_first_in_status() {
        let store = MemoryJobStore::new();
        let a = store.create(&new_job(JobType::SurvivalAnalysis)).await.unwrap();
        let b = store.create(&new_job(JobType::SurvivalAnalysis)).await.unwrap();
        let c = store.create(&new_job(JobType::SurvivalAnalysis)).await.unwrap();
        store.update(c.id, &JobUpdate::running()).await.unwrap();

        let cutoff = Utc::now() + Duration::seconds(1);
        let pending = store.list_stale(JobStatus::Pending, cutoff, 10).await.unwrap();
        let mut ids: Vec<JobId> = pending.iter().map(|j| j.id).collect();
        assert!(pending.windows(2).all(|w| w[0].updated_at <= w[1].updated_at));
        ids.sort();
        let mut expected = vec![a.id, b.id];
        expected.sort();
        assert_eq!(ids, expected);

        let limited = store.list_stale(JobStatus::Pending, cutoff, 1).await.unwrap();
        assert_eq!(limited.len(), 1);

        let none = store
            .list_stale(JobStatus::Pending, a.created_at - Duration::seconds(1), 10)
            .await
            .unwrap();
        assert!(none.is_empty());
    }
}
