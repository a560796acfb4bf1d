use std::sync::Arc;

use analysis_db::JobStore;
use analysis_storage::{ArtifactManager, LinkSigner};

use crate::config::ServerConfig;
use crate::engine::dispatcher::Dispatcher;
use crate::intake::IntakeGateway;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything is behind `Arc` or is already `Clone`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub store: Arc<dyn JobStore>,
    pub artifacts: ArtifactManager,
    /// Verifies links served by `GET /files/{*path}`.
    pub link_signer: LinkSigner,
    pub dispatcher: Arc<Dispatcher>,
    pub gateway: Arc<IntakeGateway>,
}

impl AppState {
    /// Wire the gateway from its parts.
    pub fn new(
        config: ServerConfig,
        store: Arc<dyn JobStore>,
        artifacts: ArtifactManager,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        let gateway = Arc::new(IntakeGateway::new(
            Arc::clone(&store),
            artifacts.clone(),
            Arc::clone(&dispatcher),
            config.intake.clone(),
        ));
        Self {
            link_signer: config.storage.link_signer(),
            config: Arc::new(config),
            store,
            artifacts,
            dispatcher,
            gateway,
        }
    }
}
