use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use analysis_storage::ArtifactManager;
use analysis_worker::config::WorkerConfig;
use analysis_worker::server::{self, WorkerState};
use analysis_worker::JobProcessor;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "analysis_worker=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded worker configuration");

    let store = analysis_db::connect_job_store(config.job_store, config.database_url.as_deref())
        .await
        .expect("Failed to open job store");

    let blobs = config.storage.build().await;
    tracing::info!(backend = blobs.backend_name(), "Blob storage ready");

    let processor = Arc::new(JobProcessor::new(store, ArtifactManager::new(blobs)));
    let app = server::router(WorkerState { processor }).layer(TraceLayer::new_for_http());

    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid WORKER_HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting worker");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Worker server error");

    tracing::info!("Worker stopped");
}

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
        () = ctrl_c => tracing::info!("Received SIGINT, shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
