//! Reconciliation sweep for jobs stuck at `pending` (and optionally `running`).
//!
//! Dispatch is fire-and-forget, so a job can sit at `pending` forever when the
//! trigger is lost. Each sweep re-dispatches or fails such jobs, and when a
//! running timeout is configured, fails jobs whose worker went quiet.

use std::sync::Arc;
use std::time::Duration;

use analysis_core::dispatch_policy::StalePendingAction;
use analysis_core::error::CoreError;
use analysis_core::types::{JobId, Timestamp};
use analysis_db::models::job::JobUpdate;
use analysis_db::models::status::JobStatus;
use analysis_db::{JobStore, StoreError};
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::config::ReconcileConfig;
use crate::engine::dispatcher::{DispatchOutcome, Dispatcher};

/// Jobs examined per status per sweep.
const SWEEP_BATCH_SIZE: i64 = 100;

/// Message stored on a pending job failed by the sweep.
pub const STALE_PENDING_MESSAGE: &str = "Job was never picked up by a worker";

/// Message stored on a running job failed by the sweep.
pub const STALE_RUNNING_MESSAGE: &str = "Job timed out while running";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub redispatched: usize,
    pub failed_pending: usize,
    pub failed_running: usize,
}

fn cutoff(now: Timestamp, secs: u64) -> Timestamp {
    now - chrono::Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX))
}

/// Fail `job_id` unless someone else wrote to it since `version`.
async fn fail_stale(
    store: &dyn JobStore,
    job_id: JobId,
    version: i32,
    message: &str,
) -> Result<bool, StoreError> {
    let update = JobUpdate::error(message).with_expected_version(version);
    match store.update(job_id, &update).await {
        Ok(_) => Ok(true),
        Err(StoreError::VersionConflict { .. })
        | Err(StoreError::Core(CoreError::InvalidTransition { .. })) => {
            tracing::debug!(job_id = %job_id, "Stale job changed during sweep, leaving it");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// One pass over stale jobs as of `now`.
pub async fn sweep(
    store: &dyn JobStore,
    dispatcher: &Dispatcher,
    config: &ReconcileConfig,
    now: Timestamp,
) -> Result<SweepReport, StoreError> {
    let mut report = SweepReport::default();

    let pending = store
        .list_stale(
            JobStatus::Pending,
            cutoff(now, config.stale_pending_secs),
            SWEEP_BATCH_SIZE,
        )
        .await?;

    for job in pending {
        match config.stale_pending_action {
            StalePendingAction::Redispatch => {
                if dispatcher.trigger(job.id).await == DispatchOutcome::Dispatched {
                    report.redispatched += 1;
                }
            }
            StalePendingAction::MarkError => {
                if fail_stale(store, job.id, job.version, STALE_PENDING_MESSAGE).await? {
                    tracing::warn!(job_id = %job.id, "Stale pending job marked as error");
                    report.failed_pending += 1;
                }
            }
        }
    }

    if let Some(running_secs) = config.stale_running_secs {
        let running = store
            .list_stale(JobStatus::Running, cutoff(now, running_secs), SWEEP_BATCH_SIZE)
            .await?;
        for job in running {
            if fail_stale(store, job.id, job.version, STALE_RUNNING_MESSAGE).await? {
                tracing::warn!(job_id = %job.id, "Stale running job marked as error");
                report.failed_running += 1;
            }
        }
    }

    Ok(report)
}

/// Run the sweep on a fixed interval until `cancel` is triggered.
pub async fn run(
    store: Arc<dyn JobStore>,
    dispatcher: Arc<Dispatcher>,
    config: ReconcileConfig,
    cancel: CancellationToken,
) {
    tracing::info!(
        interval_secs = config.interval_secs,
        stale_pending_secs = config.stale_pending_secs,
        stale_running_secs = ?config.stale_running_secs,
        "Stale job sweep started"
    );

    let mut interval = tokio::time::interval(Duration::from_secs(config.interval_secs.max(1)));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Stale job sweep stopping");
                break;
            }
            _ = interval.tick() => {
                match sweep(store.as_ref(), &dispatcher, &config, Utc::now()).await {
                    Ok(report) if report != SweepReport::default() => {
                        tracing::info!(
                            redispatched = report.redispatched,
                            failed_pending = report.failed_pending,
                            failed_running = report.failed_running,
                            "Stale job sweep finished"
                        );
                    }
                    Ok(_) => tracing::debug!("Stale job sweep: nothing to do"),
                    Err(e) => tracing::error!(error = %e, "Stale job sweep failed"),
                }
            }
        }
    }
}
