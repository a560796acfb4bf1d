use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use analysis_api::background;
use analysis_api::config::ServerConfig;
use analysis_api::engine::dispatcher::{
    Dispatcher, HttpWorkerClient, InProcessWorkerClient, WorkerClient,
};
use analysis_api::router::build_app_router;
use analysis_api::state::AppState;
use analysis_storage::ArtifactManager;
use analysis_worker::JobProcessor;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "analysis_api=debug,analysis_worker=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Job store ---
    let store = analysis_db::connect_job_store(config.job_store, config.database_url.as_deref())
        .await
        .expect("Failed to open job store");
    store
        .health_check()
        .await
        .expect("Job store health check failed");
    tracing::info!(backend = ?config.job_store, "Job store ready");

    // --- Blob storage ---
    let blobs = config.storage.build().await;
    let artifacts = ArtifactManager::new(blobs);
    tracing::info!(backend = artifacts.backend_name(), "Blob storage ready");

    // --- Dispatcher ---
    let client: Arc<dyn WorkerClient> = match &config.dispatch.worker_url {
        Some(url) => Arc::new(
            HttpWorkerClient::new(url, Duration::from_secs(config.dispatch.timeout_secs))
                .expect("Failed to build worker HTTP client"),
        ),
        None => {
            tracing::info!("WORKER_URL not set, processing jobs in-process");
            Arc::new(InProcessWorkerClient::new(Arc::new(JobProcessor::new(
                Arc::clone(&store),
                artifacts.clone(),
            ))))
        }
    };
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&store),
        client,
        config.dispatch.failure_policy,
    ));
    tracing::info!(policy = ?dispatcher.policy(), "Dispatcher ready");

    // --- Stale job sweep ---
    let sweep_cancel = CancellationToken::new();
    let sweep_handle = tokio::spawn(background::stale_jobs::run(
        Arc::clone(&store),
        Arc::clone(&dispatcher),
        config.reconcile.clone(),
        sweep_cancel.clone(),
    ));

    // --- App state and router ---
    let state = AppState::new(config.clone(), store, artifacts, dispatcher);
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    sweep_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), sweep_handle).await;
    tracing::info!("Stale job sweep stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT (Ctrl-C) or SIGTERM (on Unix) to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
