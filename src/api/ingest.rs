use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::ingest::pipeline::{begin_ingest, run_ingest, IngestOptions, IngestState};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct IngestRequest {
    pub namespace: Option<String>,
    /// Keep existing vectors instead of recreating the index
    pub keep_index: bool,
    pub probe: Option<String>,
}

/// POST /ingest: index the configured documents folder in the background.
pub async fn start_ingest(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<IngestState>), (StatusCode, String)> {
    // An empty body means default options
    let req: IngestRequest = if body.iter().all(u8::is_ascii_whitespace) {
        IngestRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| (StatusCode::BAD_REQUEST, format!("Invalid ingest request: {e}")))?
    };

    let started = begin_ingest(&state).map_err(|current| {
        (
            StatusCode::CONFLICT,
            format!("Ingest already running ({:?})", current.status),
        )
    })?;

    let options = IngestOptions {
        docs_dir: state.config.docs_dir.clone(),
        namespace: req.namespace.unwrap_or_default(),
        recreate: !req.keep_index,
        probe: req.probe,
    };

    tokio::spawn(async move {
        // Failures are recorded in the ingest status
        let _ = run_ingest(&state, options).await;
    });

    Ok((StatusCode::ACCEPTED, Json(started)))
}

/// GET /ingest/status
pub async fn ingest_status(State(state): State<AppState>) -> Json<IngestState> {
    Json(state.ingest.read().clone())
}
