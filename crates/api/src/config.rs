use analysis_core::dispatch_policy::{DispatchFailurePolicy, StalePendingAction};
use analysis_core::intake::{DEFAULT_MAX_DAILY_JOBS, DEFAULT_MAX_UPLOAD_BYTES};
use analysis_db::JobStoreBackend;
use analysis_storage::StorageConfig;

/// Server configuration loaded from environment variables.
///
/// All fields except the intake secret have defaults suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    pub intake: IntakeConfig,
    pub job_store: JobStoreBackend,
    pub database_url: Option<String>,
    pub storage: StorageConfig,
    pub dispatch: DispatchConfig,
    pub reconcile: ReconcileConfig,
}

/// Limits applied by the intake gateway.
#[derive(Debug, Clone)]
pub struct IntakeConfig {
    /// Shared secret callers present as `Authorization: Bearer <secret>`.
    pub secret: String,
    pub max_daily_jobs: i64,
    pub max_upload_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Base URL of the standalone worker. `None` runs jobs in-process.
    pub worker_url: Option<String>,
    pub timeout_secs: u64,
    pub failure_policy: DispatchFailurePolicy,
}

/// Settings for the stale job sweep.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    pub interval_secs: u64,
    pub stale_pending_secs: u64,
    pub stale_pending_action: StalePendingAction,
    /// `None` leaves running jobs alone.
    pub stale_running_secs: Option<u64>,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.into())
}

fn parse_env<T: std::str::FromStr>(name: &str, default: &str) -> T {
    env_or(name, default)
        .parse()
        .unwrap_or_else(|_| panic!("{name} must be a valid {}", std::any::type_name::<T>()))
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                    |
    /// |---------------------------|----------------------------|
    /// | `HOST`                    | `0.0.0.0`                  |
    /// | `PORT`                    | `3000`                     |
    /// | `CORS_ORIGINS`            | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`                       |
    /// | `INTAKE_SECRET`           | required                   |
    /// | `MAX_DAILY_JOBS`          | `50`                       |
    /// | `MAX_UPLOAD_BYTES`        | `10485760`                 |
    /// | `JOB_STORE_BACKEND`       | `postgres`                 |
    /// | `DATABASE_URL`            | required for postgres      |
    /// | `PUBLIC_BASE_URL`         | `http://localhost:3000`    |
    /// | `WORKER_URL`              | unset (in-process worker)  |
    /// | `DISPATCH_TIMEOUT_SECS`   | `10`                       |
    /// | `DISPATCH_FAILURE_POLICY` | `stall`                    |
    /// | `RECONCILE_INTERVAL_SECS` | `60`                       |
    /// | `STALE_PENDING_SECS`      | `300`                      |
    /// | `STALE_PENDING_ACTION`    | `redispatch`               |
    /// | `STALE_RUNNING_SECS`      | unset                      |
    ///
    /// Storage variables are read by [`StorageConfig::from_env`].
    ///
    /// # Panics
    ///
    /// Panics when `INTAKE_SECRET` is missing or any value is malformed.
    pub fn from_env() -> Self {
        let host = env_or("HOST", "0.0.0.0");
        let port: u16 = parse_env("PORT", "3000");

        let cors_origins: Vec<String> = env_or("CORS_ORIGINS", "http://localhost:5173")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = parse_env("REQUEST_TIMEOUT_SECS", "30");

        let secret = std::env::var("INTAKE_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .expect("INTAKE_SECRET must be set");
        let intake = IntakeConfig {
            secret,
            max_daily_jobs: parse_env("MAX_DAILY_JOBS", &DEFAULT_MAX_DAILY_JOBS.to_string()),
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", &DEFAULT_MAX_UPLOAD_BYTES.to_string()),
        };

        let job_store = JobStoreBackend::from_name(&env_or("JOB_STORE_BACKEND", "postgres"))
            .unwrap_or_else(|e| panic!("JOB_STORE_BACKEND: {e}"));

        let public_base_url = env_or("PUBLIC_BASE_URL", "http://localhost:3000");
        let storage = StorageConfig::from_env(&intake.secret, &public_base_url);

        let dispatch = DispatchConfig {
            worker_url: std::env::var("WORKER_URL").ok().filter(|s| !s.is_empty()),
            timeout_secs: parse_env("DISPATCH_TIMEOUT_SECS", "10"),
            failure_policy: DispatchFailurePolicy::from_name(&env_or(
                "DISPATCH_FAILURE_POLICY",
                "stall",
            ))
            .unwrap_or_else(|e| panic!("DISPATCH_FAILURE_POLICY: {e}")),
        };

        let reconcile = ReconcileConfig {
            interval_secs: parse_env("RECONCILE_INTERVAL_SECS", "60"),
            stale_pending_secs: parse_env("STALE_PENDING_SECS", "300"),
            stale_pending_action: StalePendingAction::from_name(&env_or(
                "STALE_PENDING_ACTION",
                "redispatch",
            ))
            .unwrap_or_else(|e| panic!("STALE_PENDING_ACTION: {e}")),
            stale_running_secs: std::env::var("STALE_RUNNING_SECS").ok().map(|v| {
                v.parse()
                    .unwrap_or_else(|_| panic!("STALE_RUNNING_SECS must be a valid u64"))
            }),
        };

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            intake,
            job_store,
            database_url: std::env::var("DATABASE_URL").ok(),
            storage,
            dispatch,
            reconcile,
        }
    }
}
