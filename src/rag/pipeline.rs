use anyhow::{Context, Result};
use std::fmt::Write;

use crate::index::{IndexMatch, QueryFilter};
use crate::llm::chat::complete_chat;
use crate::llm::embeddings::embed_single;
use crate::models::{Answer, ChatMessage};
use crate::state::AppState;

/// Answer returned when retrieval keeps no match.
pub const NO_MATCH_ANSWER: &str = "No relevant document found.";

/// Source label for matches stored without a source.
const UNKNOWN_SOURCE: &str = "unknown";

/// Chat-template control tokens that must not reach the model from
/// user text or document content.
const CONTROL_TOKENS: &[&str] = &[
    "<|im_start|>",
    "<|im_end|>",
    "<|endoftext|>",
    "<|begin_of_text|>",
    "<|start_header_id|>",
    "<|end_header_id|>",
    "<|eot_id|>",
];

/// Retrieve context for `query` and generate a grounded answer.
pub async fn ask_question(
    state: &AppState,
    query: &str,
    user_id: &str,
    role: Option<&str>,
) -> Result<Answer> {
    let route = state.router.resolve(role);
    tracing::info!(
        "Question from user {user_id} (role: {}, namespace: '{}'): {query}",
        route.role.as_deref().unwrap_or("default"),
        route.namespace
    );

    // ── Step 1: Embed the question ───────────────────────
    let vector = embed_single(&state.http_client, &state.config.embedding, query)
        .await
        .context("Failed to embed question")?;

    // ── Step 2: Similarity search ────────────────────────
    let filter = QueryFilter {
        domain: route.domain.clone(),
    };
    let matches = state
        .index
        .query(&route.namespace, vector, state.config.retrieval.top_k, &filter)
        .await
        .context("Vector index query failed")?;
    let fetched = matches.len();
    let matches = filter_by_threshold(matches, route.score_threshold);
    tracing::debug!(
        "Retrieved {fetched} match(es), {} above threshold",
        matches.len()
    );

    if matches.is_empty() {
        tracing::info!("No relevant document for user {user_id}");
        return Ok(Answer {
            query: query.to_string(),
            result: NO_MATCH_ANSWER.to_string(),
            sources: Vec::new(),
            context: Vec::new(),
        });
    }

    // ── Step 3: Generate ─────────────────────────────────
    let messages = build_messages(&matches, query);
    let result = complete_chat(
        &state.http_client,
        &state.config.llm,
        &route.chat_model,
        messages,
    )
    .await
    .context("Answer generation failed")?;

    let reported = state.config.retrieval.context_chunks;
    let answer = Answer {
        query: query.to_string(),
        result: result.trim().to_string(),
        sources: collect_sources(&matches, reported),
        context: context_chunks(&matches, reported),
    };
    tracing::info!(
        "Answered user {user_id} with {} source(s): {:?}",
        answer.sources.len(),
        answer.sources
    );
    Ok(answer)
}

/// Drop matches scoring strictly below `threshold`. Order is preserved.
pub fn filter_by_threshold(matches: Vec<IndexMatch>, threshold: Option<f32>) -> Vec<IndexMatch> {
    match threshold {
        Some(min) => matches.into_iter().filter(|m| m.score >= min).collect(),
        None => matches,
    }
}

/// Distinct source names of the first `limit` matches, in rank order.
pub fn collect_sources(matches: &[IndexMatch], limit: usize) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for m in matches.iter().take(limit) {
        let source = m.source.as_deref().unwrap_or(UNKNOWN_SOURCE);
        if !sources.iter().any(|s| s == source) {
            sources.push(source.to_string());
        }
    }
    sources
}

/// Texts of the first `limit` matches, in rank order.
pub fn context_chunks(matches: &[IndexMatch], limit: usize) -> Vec<String> {
    matches
        .iter()
        .take(limit)
        .map(|m| m.text.clone())
        .collect()
}

/// Strip chat-template control tokens from untrusted text.
pub fn sanitize_for_prompt(text: &str) -> String {
    let mut cleaned = text.to_string();
    for token in CONTROL_TOKENS {
        if cleaned.contains(token) {
            cleaned = cleaned.replace(token, "");
        }
    }
    cleaned
}

fn build_system_prompt() -> String {
    String::from(
        "You are a document assistant. Each user message includes passages retrieved \
         from the user's document collection.\n\
         Use only these passages to answer the question at the end.\n\
         If the passages do not contain the answer, say that you don't know. \
         Do not make up an answer.\n\
         Answer in the language of the question.",
    )
}

fn build_context_block(matches: &[IndexMatch]) -> String {
    let mut ctx = String::new();
    for m in matches {
        let source = m.source.as_deref().unwrap_or(UNKNOWN_SOURCE);
        let _ = match m.page {
            Some(page) => writeln!(ctx, "--- {source} (page {page}) ---"),
            None => writeln!(ctx, "--- {source} ---"),
        };
        ctx.push_str(&sanitize_for_prompt(&m.text));
        ctx.push_str("\n\n");
    }
    ctx
}

pub fn build_messages(matches: &[IndexMatch], question: &str) -> Vec<ChatMessage> {
    let context_block = build_context_block(matches);
    vec![
        ChatMessage {
            role: "system".to_string(),
            content: build_system_prompt(),
        },
        ChatMessage {
            role: "user".to_string(),
            content: format!(
                "{context_block}---\nQuestion: {}",
                sanitize_for_prompt(question)
            ),
        },
    ]
}
