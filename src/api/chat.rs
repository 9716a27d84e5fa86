use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::models::{ChatRequest, ChatResponse};
use crate::rag::pipeline::ask_question;
use crate::state::AppState;

const MAX_CHAT_MESSAGE_LEN: usize = 2000;

/// POST /chat: answer a question from the indexed documents.
pub async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, String)> {
    // ── Step 1: Validate input ───────────────────────────
    let message = req.message.trim();
    if message.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Message is required".to_string()));
    }
    let message = truncate_to_char_boundary(message, MAX_CHAT_MESSAGE_LEN);

    // ── Step 2: Acquire a worker slot ────────────────────
    let permit = state
        .chat_semaphore
        .clone()
        .acquire_owned()
        .await
        .map_err(|_| {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Chat service at capacity".to_string(),
            )
        })?;

    // ── Step 3: Run the pipeline off the request task ────
    let timeout = Duration::from_secs(state.config.answer_timeout_secs);
    let user_id = req.user_id;
    let role = req.role;
    let handle = tokio::spawn(async move {
        let _permit = permit;
        tokio::time::timeout(
            timeout,
            ask_question(&state, &message, &user_id, role.as_deref()),
        )
        .await
    });

    match handle.await {
        Ok(Ok(Ok(answer))) => Ok(Json(answer.into())),
        Ok(Ok(Err(e))) => {
            tracing::error!("RAG pipeline failed: {e:#}");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("RAG pipeline failed: {e:#}"),
            ))
        }
        Ok(Err(_)) => {
            tracing::warn!("RAG pipeline timed out after {}s", timeout.as_secs());
            Err((
                StatusCode::GATEWAY_TIMEOUT,
                "Answer generation timed out".to_string(),
            ))
        }
        Err(e) => {
            tracing::error!("RAG pipeline task failed: {e}");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "RAG pipeline task failed".to_string(),
            ))
        }
    }
}

/// Keep at most `max_chars` characters of `s`.
fn truncate_to_char_boundary(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((end, _)) => s[..end].to_string(),
        None => s.to_string(),
    }
}
