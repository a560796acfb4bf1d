//! Job persistence: PostgreSQL pool and migrations, row models, the
//! [`JobRepo`](repositories::JobRepo) query layer, and the
//! [`JobStore`](store::JobStore) abstraction with Postgres and in-memory
//! backends.

use std::sync::Arc;

use analysis_core::error::CoreError;
use sqlx::postgres::PgPoolOptions;

pub mod error;
pub mod memory;
pub mod models;
pub mod repositories;
pub mod store;

pub use error::StoreError;
pub use memory::MemoryJobStore;
pub use store::{JobStore, PgJobStore};

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to confirm the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}

/// Apply any pending migrations from `db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../db/migrations").run(pool).await
}

/// Which [`JobStore`] implementation a binary runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStoreBackend {
    Postgres,
    Memory,
}

impl JobStoreBackend {
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name {
            "postgres" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(CoreError::Validation(format!(
                "Unknown job store backend '{other}'. Must be one of: postgres, memory"
            ))),
        }
    }
}

/// Open the configured store. For Postgres this connects, checks health and
/// applies pending migrations.
pub async fn connect_job_store(
    backend: JobStoreBackend,
    database_url: Option<&str>,
) -> Result<Arc<dyn JobStore>, StoreError> {
    match backend {
        JobStoreBackend::Memory => {
            tracing::warn!("Using in-memory job store; jobs are lost on restart");
            Ok(Arc::new(MemoryJobStore::new()))
        }
        JobStoreBackend::Postgres => {
            let url = database_url.ok_or_else(|| {
                CoreError::Validation("DATABASE_URL must be set for the postgres job store".into())
            })?;
            let pool = create_pool(url).await?;
            tracing::info!("Database connection pool created");
            health_check(&pool).await?;
            run_migrations(&pool).await?;
            tracing::info!("Database migrations applied");
            Ok(Arc::new(PgJobStore::new(pool)))
        }
    }
}
