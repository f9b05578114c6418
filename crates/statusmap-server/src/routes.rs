use std::path::Path;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use statusmap_core::{NagiosClient, StatusRow, StatusService};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<StatusService<NagiosClient>>,
}

pub fn build_router(state: AppState, static_dir: &Path) -> Router {
    Router::new()
        .route("/api/status", get(api_status))
        .route("/health", get(|| async { "ok" }))
        .fallback_service(ServeDir::new(static_dir).append_index_html_on_directories(true))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Upstream failures never surface here: degraded hosts come back as
// UNKNOWN rows inside the array.
async fn api_status(State(state): State<AppState>) -> Json<Vec<StatusRow>> {
    let snapshot = state.service.get_status().await;
    Json(snapshot.to_rows())
}
