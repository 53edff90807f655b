use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::handler;

/// Shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Held for the whole of a merge; merges never overlap.
    pub merge_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config: Arc::new(config),
            merge_lock: Arc::new(Mutex::new(())),
        }
    }
}

/// Build the axum router with all recon endpoints.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/health", get(handler::health_handler))
        .route("/v1/info", get(handler::info_handler))
        .route("/v1/merge", post(handler::merge_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
