use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub index_provider: &'static str,
    pub vectors: usize,
    /// Configured chat roles, sorted
    pub roles: Vec<String>,
}

/// GET /health
pub async fn health(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, (StatusCode, String)> {
    let vectors = state.index.count().await.map_err(|e| {
        tracing::warn!("Health check could not reach the vector index: {e:#}");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("Vector index unavailable: {e:#}"),
        )
    })?;

    Ok(Json(HealthResponse {
        status: "ok",
        index_provider: state.index.provider(),
        vectors,
        roles: state.router.roles().into_iter().map(str::to_string).collect(),
    }))
}
