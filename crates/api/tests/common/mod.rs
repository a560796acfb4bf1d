#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use analysis_api::config::{DispatchConfig, IntakeConfig, ReconcileConfig, ServerConfig};
use analysis_api::engine::dispatcher::{DispatchError, Dispatcher, WorkerClient};
use analysis_api::router::build_app_router;
use analysis_api::state::AppState;
use analysis_core::dispatch_policy::{DispatchFailurePolicy, StalePendingAction};
use analysis_core::intake::{DEFAULT_MAX_DAILY_JOBS, DEFAULT_MAX_UPLOAD_BYTES};
use analysis_core::error::CoreError;
use analysis_core::job_type::JobType;
use analysis_core::types::{JobId, Timestamp};
use analysis_db::models::job::{CreateJob, Job, JobUpdate};
use analysis_db::models::status::JobStatus;
use analysis_db::{JobStore, JobStoreBackend, MemoryJobStore, StoreError};
use analysis_storage::{
    ArtifactManager, BlobStore, MemoryBlobStore, StorageBackendType, StorageConfig, StorageError,
};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_SECRET: &str = "test-intake-secret";
pub const PUBLIC_BASE_URL: &str = "http://localhost:3000";
pub const BOUNDARY: &str = "analysis-test-boundary";

/// Build a test `ServerConfig` with in-memory backends and production limits.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        intake: IntakeConfig {
            secret: TEST_SECRET.to_string(),
            max_daily_jobs: DEFAULT_MAX_DAILY_JOBS,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        },
        job_store: JobStoreBackend::Memory,
        database_url: None,
        storage: StorageConfig {
            backend: StorageBackendType::Memory,
            bucket: "test-uploads".to_string(),
            local_root: "storage/test".into(),
            signing_secret: TEST_SECRET.to_string(),
            public_base_url: PUBLIC_BASE_URL.to_string(),
        },
        dispatch: DispatchConfig {
            worker_url: None,
            timeout_secs: 5,
            failure_policy: DispatchFailurePolicy::Stall,
        },
        reconcile: ReconcileConfig {
            interval_secs: 60,
            stale_pending_secs: 300,
            stale_pending_action: StalePendingAction::Redispatch,
            stale_running_secs: None,
        },
    }
}

/// Worker client that records every trigger and optionally refuses them.
#[derive(Default)]
pub struct RecordingWorker {
    calls: Mutex<Vec<(JobId, Uuid)>>,
    fail: bool,
}

impl RecordingWorker {
    pub fn accepting() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    pub fn calls(&self) -> Vec<(JobId, Uuid)> {
        self.calls.lock().unwrap().clone()
    }

    /// Poll until at least `n` triggers arrived.
    pub async fn wait_for_calls(&self, n: usize) -> Vec<(JobId, Uuid)> {
        for _ in 0..200 {
            let calls = self.calls();
            if calls.len() >= n {
                return calls;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {n} worker triggers, got {}", self.calls().len());
    }
}

#[async_trait]
impl WorkerClient for RecordingWorker {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn trigger(&self, job_id: JobId, dispatch_token: Uuid) -> Result<(), DispatchError> {
        self.calls.lock().unwrap().push((job_id, dispatch_token));
        if self.fail {
            return Err(DispatchError::Rejected {
                status: 503,
                body: "worker unavailable".into(),
            });
        }
        Ok(())
    }
}

/// Blob store whose writes always fail.
pub struct UnwritableBlobs;

#[async_trait]
impl BlobStore for UnwritableBlobs {
    fn backend_name(&self) -> &'static str {
        "unwritable"
    }
    async fn put(&self, _path: &str, _bytes: Vec<u8>) -> Result<(), StorageError> {
        Err(StorageError::Backend("bucket unavailable".into()))
    }
    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        Err(StorageError::NotFound(path.to_string()))
    }
    async fn delete(&self, _path: &str) -> Result<(), StorageError> {
        Ok(())
    }
    async fn signed_url(&self, path: &str, _ttl: Duration) -> Result<String, StorageError> {
        Err(StorageError::NotFound(path.to_string()))
    }
}

/// How [`RejectingInserts`] fails `create_within_quota`.
#[derive(Debug, Clone, Copy)]
pub enum InsertFailure {
    /// Another upload took the last slot between the early count and the insert.
    QuotaLost,
    /// The database went away.
    Unavailable,
}

/// Job store that passes the early quota count but fails every insert.
pub struct RejectingInserts {
    pub inner: Arc<MemoryJobStore>,
    pub failure: InsertFailure,
}

#[async_trait]
impl JobStore for RejectingInserts {
    async fn create(&self, input: &CreateJob) -> Result<Job, StoreError> {
        self.inner.create(input).await
    }

    async fn create_within_quota(
        &self,
        _input: &CreateJob,
        _since: Timestamp,
        limit: i64,
    ) -> Result<Job, StoreError> {
        Err(match self.failure {
            InsertFailure::QuotaLost => CoreError::RateLimited { limit }.into(),
            InsertFailure::Unavailable => StoreError::Database(sqlx::Error::PoolTimedOut),
        })
    }

    async fn get(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        self.inner.get(id).await
    }

    async fn update(&self, id: JobId, update: &JobUpdate) -> Result<Job, StoreError> {
        self.inner.update(id, update).await
    }

    async fn count(&self, job_type: Option<JobType>, since: Timestamp) -> Result<i64, StoreError> {
        self.inner.count(job_type, since).await
    }

    async fn list_stale(
        &self,
        status: JobStatus,
        updated_before: Timestamp,
        limit: i64,
    ) -> Result<Vec<Job>, StoreError> {
        self.inner.list_stale(status, updated_before, limit).await
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.inner.health_check().await
    }
}

/// Everything a test needs to drive the app and inspect its backends.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryJobStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub worker: Arc<RecordingWorker>,
    pub dispatcher: Arc<Dispatcher>,
}

impl TestApp {
    pub fn app(&self) -> Router {
        self.router.clone()
    }
}

/// Build the full application router with all middleware layers.
///
/// Uses the same [`build_app_router`] as `main.rs` so tests exercise the
/// production middleware stack.
pub fn build_test_app_with(
    config: ServerConfig,
    blobs: Arc<dyn BlobStore>,
    worker: Arc<RecordingWorker>,
) -> TestApp {
    let store = Arc::new(MemoryJobStore::new());
    let job_store: Arc<dyn JobStore> = store.clone();
    build_test_app_on(config, store, job_store, blobs, worker)
}

/// Like [`build_test_app_with`], but the app talks to `job_store`, which
/// may wrap `store`.
pub fn build_test_app_on(
    config: ServerConfig,
    store: Arc<MemoryJobStore>,
    job_store: Arc<dyn JobStore>,
    blobs: Arc<dyn BlobStore>,
    worker: Arc<RecordingWorker>,
) -> TestApp {
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&job_store),
        worker.clone(),
        config.dispatch.failure_policy,
    ));
    let artifacts = ArtifactManager::new(Arc::clone(&blobs));
    let state = AppState::new(config.clone(), job_store, artifacts, Arc::clone(&dispatcher));

    TestApp {
        router: build_app_router(state, &config),
        store,
        blobs,
        worker,
        dispatcher,
    }
}

pub fn build_test_app() -> TestApp {
    let config = test_config();
    let blobs: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new(config.storage.link_signer()));
    build_test_app_with(config, blobs, RecordingWorker::accepting())
}

/// One multipart field: name, optional filename, content.
pub type Part<'a> = (&'a str, Option<&'a str>, &'a [u8]);

/// Encode `parts` as a `multipart/form-data` body using [`BOUNDARY`].
pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, file_name, content) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match file_name {
            Some(file_name) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: text/csv\r\n\r\n"
                    )
                    .as_bytes(),
                );
            }
            None => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
            }
        }
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Standard upload form: a CSV file plus `job_type`.
pub fn upload_form(job_type: &str, file_name: &str, csv: &[u8]) -> Vec<u8> {
    multipart_body(&[
        ("file", Some(file_name), csv),
        ("job_type", None, job_type.as_bytes()),
    ])
}

/// POST a multipart body, optionally with a bearer credential.
pub async fn post_multipart(
    app: Router,
    uri: &str,
    credential: Option<&str>,
    body: Vec<u8>,
) -> Response {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(credential) = credential {
        builder = builder.header(AUTHORIZATION, format!("Bearer {credential}"));
    }
    app.oneshot(builder.body(Body::from(body)).unwrap())
        .await
        .unwrap()
}

/// Submit a CSV with the test credential.
pub async fn submit(app: Router, job_type: &str, csv: &[u8]) -> Response {
    post_multipart(
        app,
        "/api/v1/jobs",
        Some(TEST_SECRET),
        upload_form(job_type, "data.csv", csv),
    )
    .await
}

pub async fn get(app: Router, uri: &str) -> Response {
    get_with_credential(app, uri, None).await
}

pub async fn get_with_credential(app: Router, uri: &str, credential: Option<&str>) -> Response {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(credential) = credential {
        builder = builder.header(AUTHORIZATION, format!("Bearer {credential}"));
    }
    app.oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
