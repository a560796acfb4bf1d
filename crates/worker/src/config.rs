use analysis_db::JobStoreBackend;
use analysis_storage::StorageConfig;

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3100`).
    pub port: u16,
    pub job_store: JobStoreBackend,
    pub database_url: Option<String>,
    pub storage: StorageConfig,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var             | Default                 |
    /// |---------------------|-------------------------|
    /// | `WORKER_HOST`       | `0.0.0.0`               |
    /// | `WORKER_PORT`       | `3100`                  |
    /// | `JOB_STORE_BACKEND` | `postgres`              |
    /// | `DATABASE_URL`      | required for postgres   |
    /// | `PUBLIC_BASE_URL`   | `http://localhost:3000` |
    ///
    /// Storage variables are read by [`StorageConfig::from_env`].
    pub fn from_env() -> Self {
        let host = std::env::var("WORKER_HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("WORKER_PORT")
            .unwrap_or_else(|_| "3100".into())
            .parse()
            .expect("WORKER_PORT must be a valid u16");

        let job_store = JobStoreBackend::from_name(
            &std::env::var("JOB_STORE_BACKEND").unwrap_or_else(|_| "postgres".into()),
        )
        .unwrap_or_else(|e| panic!("JOB_STORE_BACKEND: {e}"));

        let public_base_url =
            std::env::var("PUBLIC_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".into());
        let signing_fallback = std::env::var("INTAKE_SECRET").unwrap_or_default();

        Self {
            host,
            port,
            job_store,
            database_url: std::env::var("DATABASE_URL").ok(),
            storage: StorageConfig::from_env(&signing_fallback, &public_base_url),
        }
    }
}
