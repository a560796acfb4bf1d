//! Repository for the `jobs` table.
//!
//! Status moves are guarded: the current row is locked with `FOR UPDATE`,
//! checked against the transition table and the optional expected version,
//! then written. Daily quota enforcement takes a transaction-scoped advisory
//! lock so concurrent uploads cannot jointly overshoot the limit.

use analysis_core::error::CoreError;
use analysis_core::intake::check_daily_quota;
use analysis_core::job_type::JobType;
use analysis_core::types::{JobId, Timestamp};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::job::{check_update, CreateJob, Job, JobUpdate};
use crate::models::status::JobStatus;

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, job_type, status_id, input_file_path, result, error_message, \
    progress, column_config, dispatch_token, version, created_at, updated_at";

/// Advisory lock key serializing quota-checked inserts.
const INTAKE_QUOTA_LOCK_KEY: i64 = 0x6a6f_6273_7175_6f74;

/// Maximum rows returned by a stale-job scan.
const MAX_STALE_LIMIT: i64 = 500;

/// Provides guarded CRUD operations for analysis jobs.
pub struct JobRepo;

impl JobRepo {
    /// Insert a new pending job.
    pub async fn create(pool: &PgPool, input: &CreateJob) -> Result<Job, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        Self::insert(&mut *conn, input).await
    }

    /// Count today's jobs and insert only if the quota still allows it.
    ///
    /// Both steps run in one transaction holding [`INTAKE_QUOTA_LOCK_KEY`].
    pub async fn create_within_quota(
        pool: &PgPool,
        input: &CreateJob,
        since: Timestamp,
        limit: i64,
    ) -> Result<Job, StoreError> {
        let mut tx = pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(INTAKE_QUOTA_LOCK_KEY)
            .execute(&mut *tx)
            .await?;

        let created: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE created_at >= $1")
            .bind(since)
            .fetch_one(&mut *tx)
            .await?;
        check_daily_quota(created, limit)?;

        let job = Self::insert(&mut *tx, input).await?;
        tx.commit().await?;
        Ok(job)
    }

    async fn insert(conn: &mut PgConnection, input: &CreateJob) -> Result<Job, sqlx::Error> {
        let query = format!(
            "INSERT INTO jobs (id, job_type, status_id, input_file_path, column_config, dispatch_token) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(Uuid::now_v7())
            .bind(input.job_type.as_str())
            .bind(JobStatus::Pending.id())
            .bind(&input.input_file_path)
            .bind(&input.column_config)
            .bind(Uuid::new_v4())
            .fetch_one(conn)
            .await
    }

    /// Find a job by its ID.
    pub async fn find_by_id(pool: &PgPool, id: JobId) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Apply a partial update after checking it against the locked row.
    ///
    /// Fields absent from `update` keep their stored value. `version` is
    /// incremented and `updated_at` refreshed on every successful write.
    pub async fn update(pool: &PgPool, id: JobId, update: &JobUpdate) -> Result<Job, StoreError> {
        let mut tx = pool.begin().await?;

        let select = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1 FOR UPDATE");
        let current = sqlx::query_as::<_, Job>(&select)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(CoreError::NotFound { entity: "Job", id })?;

        check_update(&current, update)?;

        let query = format!(
            "UPDATE jobs SET \
                 status_id = COALESCE($2, status_id), \
                 result = COALESCE($3, result), \
                 error_message = COALESCE($4, error_message), \
                 progress = COALESCE($5, progress), \
                 input_file_path = CASE WHEN $6 THEN NULL ELSE input_file_path END, \
                 version = version + 1, \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .bind(update.status.map(JobStatus::id))
            .bind(&update.result)
            .bind(&update.error_message)
            .bind(update.progress)
            .bind(update.clear_input_file)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(updated)
    }

    /// Count jobs created at or after `since`, optionally for one job type.
    pub async fn count_since(
        pool: &PgPool,
        job_type: Option<JobType>,
        since: Timestamp,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM jobs \
             WHERE created_at >= $1 AND ($2::TEXT IS NULL OR job_type = $2)",
        )
        .bind(since)
        .bind(job_type.map(JobType::as_str))
        .fetch_one(pool)
        .await
    }

    /// Oldest-first jobs sitting in `status` since before `updated_before`.
    pub async fn list_stale(
        pool: &PgPool,
        status: JobStatus,
        updated_before: Timestamp,
        limit: i64,
    ) -> Result<Vec<Job>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs \
             WHERE status_id = $1 AND updated_at < $2 \
             ORDER BY updated_at ASC \
             LIMIT $3"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(status.id())
            .bind(updated_before)
            .bind(limit.clamp(1, MAX_STALE_LIMIT))
            .fetch_all(pool)
            .await
    }
}
