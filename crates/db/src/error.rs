use analysis_core::error::CoreError;
use analysis_core::types::JobId;

/// Error returned by every [`JobStore`](crate::store::JobStore) backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Domain rule violations: unknown job, illegal transition, quota, bad update.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The caller's expected version no longer matches the stored row.
    #[error("Job {id} was modified concurrently (expected version {expected}, found {actual})")]
    VersionConflict {
        id: JobId,
        expected: i32,
        actual: i32,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}
