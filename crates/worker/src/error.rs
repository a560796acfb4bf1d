use analysis_core::types::JobId;
use analysis_db::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Job {0} not found")]
    JobNotFound(JobId),

    /// The trigger's dispatch token does not belong to the job.
    #[error("Dispatch token does not match job {0}")]
    TokenMismatch(JobId),

    /// The computation rejected the input; the message is stored on the job.
    #[error("{0}")]
    Compute(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
