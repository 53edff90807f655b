use std::path::PathBuf;

use axum::extract::State;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use recon_archive::{merge_archives, ArchiveMergeReport};

use crate::error::{ServerError, ServerResult};
use crate::router::AppState;

/// Body of `POST /v1/merge`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MergeRequest {
    #[serde(alias = "zip1_path")]
    pub primary: PathBuf,
    #[serde(alias = "zip2_path")]
    pub secondary: PathBuf,
    #[serde(default)]
    pub output: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize)]
pub struct MergeResponse {
    pub message: String,
    pub output: PathBuf,
    pub report: ArchiveMergeReport,
}

/// Health check handler.
pub async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Info handler.
pub async fn info_handler() -> Json<serde_json::Value> {
    Json(json!({
        "name": "recon-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Merge two zip bundles on the server's filesystem.
///
/// Merges run one at a time on a blocking thread.
pub async fn merge_handler(
    State(state): State<AppState>,
    Json(request): Json<MergeRequest>,
) -> ServerResult<Json<MergeResponse>> {
    for bundle in [&request.primary, &request.secondary] {
        if !bundle.is_file() {
            return Err(ServerError::BundleNotFound(bundle.clone()));
        }
    }
    let output = request
        .output
        .unwrap_or_else(|| state.config.default_output());

    let _guard = state.merge_lock.lock().await;
    tracing::info!(
        primary = %request.primary.display(),
        secondary = %request.secondary.display(),
        output = %output.display(),
        "merge requested"
    );

    let config = state.config.clone();
    let (primary, secondary, out) = (request.primary, request.secondary, output.clone());
    let report = tokio::task::spawn_blocking(move || {
        merge_archives(&primary, &secondary, &out, &config.workspace_root, &config.tree)
    })
    .await
    .map_err(|e| ServerError::Internal(e.to_string()))??;

    Ok(Json(MergeResponse {
        message: "Merge completed".to_string(),
        output,
        report,
    }))
}
