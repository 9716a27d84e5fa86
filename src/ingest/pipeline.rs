use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::chunking::chunk_pages;
use crate::index::{IndexRecord, QueryFilter};
use crate::ingest::loader::load_folder;
use crate::llm::embeddings::{embed_batch, embed_single};
use crate::state::AppState;

/// Chunks embedded and upserted per round trip.
const EMBED_BATCH: usize = 128;
/// Matches logged for the probe query.
const PROBE_TOP_K: usize = 5;
const PROBE_EXCERPT_CHARS: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum IngestStatus {
    Idle,
    Loading,
    Embedding,
    Ready,
    Error(String),
}

impl IngestStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, IngestStatus::Loading | IngestStatus::Embedding)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IngestReport {
    pub files_loaded: usize,
    pub files_skipped: usize,
    pub pages: usize,
    pub chunks: usize,
    pub vectors: usize,
}

/// Progress of the most recent ingest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestState {
    pub status: IngestStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub report: Option<IngestReport>,
}

impl Default for IngestState {
    fn default() -> Self {
        Self {
            status: IngestStatus::Idle,
            started_at: None,
            finished_at: None,
            report: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub docs_dir: PathBuf,
    pub namespace: String,
    /// Drop and recreate the index before loading
    pub recreate: bool,
    /// Query run against the fresh index to check retrieval
    pub probe: Option<String>,
}

impl IngestOptions {
    pub fn new(docs_dir: PathBuf) -> Self {
        Self {
            docs_dir,
            namespace: String::new(),
            recreate: true,
            probe: None,
        }
    }
}

/// Claim the ingest slot. Returns the current state instead when a run is
/// already in progress.
pub fn begin_ingest(state: &AppState) -> std::result::Result<IngestState, IngestState> {
    let mut ingest = state.ingest.write();
    if ingest.status.is_running() {
        return Err(ingest.clone());
    }
    *ingest = IngestState {
        status: IngestStatus::Loading,
        started_at: Some(Utc::now()),
        finished_at: None,
        report: None,
    };
    Ok(ingest.clone())
}

fn update_status(state: &AppState, status: IngestStatus) {
    state.ingest.write().status = status;
}

fn finish(state: &AppState, status: IngestStatus, report: Option<IngestReport>) {
    let mut ingest = state.ingest.write();
    ingest.status = status;
    ingest.finished_at = Some(Utc::now());
    ingest.report = report;
}

/// Load, chunk, embed and index every document in `options.docs_dir`.
/// Progress and the outcome are recorded in `state.ingest`.
pub async fn run_ingest(state: &AppState, options: IngestOptions) -> Result<IngestReport> {
    {
        // Runs claimed through `begin_ingest` keep their start time
        let mut current = state.ingest.write();
        if !current.status.is_running() {
            current.started_at = Some(Utc::now());
            current.finished_at = None;
            current.report = None;
        }
        current.status = IngestStatus::Loading;
    }

    match ingest_folder(state, &options).await {
        Ok(report) => {
            tracing::info!(
                "Ingest complete: {} file(s), {} chunk(s), {} vector(s)",
                report.files_loaded,
                report.chunks,
                report.vectors
            );
            finish(state, IngestStatus::Ready, Some(report.clone()));
            Ok(report)
        }
        Err(e) => {
            tracing::error!("Ingest failed: {e:#}");
            finish(state, IngestStatus::Error(format!("{e:#}")), None);
            Err(e)
        }
    }
}

async fn ingest_folder(state: &AppState, options: &IngestOptions) -> Result<IngestReport> {
    let config = &state.config;

    if options.recreate {
        tracing::info!(
            "Resetting {} vector index (dimension {})",
            state.index.provider(),
            config.embedding.dim
        );
        state
            .index
            .reset(config.embedding.dim)
            .await
            .context("Failed to reset vector index")?;
    }

    // ── Step 1: Load documents (blocking I/O and parsing) ─
    let docs_dir = options.docs_dir.clone();
    tracing::info!("Loading documents from {}", docs_dir.display());
    let loaded = tokio::task::spawn_blocking(move || load_folder(&docs_dir)).await??;

    // ── Step 2: Chunk ────────────────────────────────────
    let chunks = chunk_pages(
        &loaded.pages,
        config.retrieval.chunk_size,
        config.retrieval.chunk_overlap,
    );

    let mut report = IngestReport {
        files_loaded: loaded.files_loaded,
        files_skipped: loaded.skipped.len(),
        pages: loaded.pages.len(),
        chunks: chunks.len(),
        vectors: 0,
    };

    if chunks.is_empty() {
        tracing::warn!("No text found in {}", options.docs_dir.display());
        return Ok(report);
    }

    // ── Step 3: Embed and upsert ─────────────────────────
    update_status(state, IngestStatus::Embedding);
    for (batch_no, batch) in chunks.chunks(EMBED_BATCH).enumerate() {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let embeddings = embed_batch(&state.http_client, &config.embedding, &texts)
            .await
            .with_context(|| format!("Embedding failed for batch {}", batch_no + 1))?;

        let records: Vec<IndexRecord> = batch
            .iter()
            .zip(embeddings)
            .map(|(chunk, values)| IndexRecord::from_chunk(chunk, values))
            .collect();

        report.vectors += state
            .index
            .upsert(&options.namespace, records)
            .await
            .context("Failed to upsert vectors")?;
        tracing::info!(
            "Indexed {}/{} chunks",
            (batch_no * EMBED_BATCH + batch.len()).min(chunks.len()),
            chunks.len()
        );
    }
    state
        .index
        .flush()
        .await
        .context("Failed to persist vector index")?;

    // ── Step 4: Probe ────────────────────────────────────
    if let Some(probe) = options.probe.as_deref().filter(|p| !p.trim().is_empty()) {
        run_probe(state, &options.namespace, probe).await?;
    }

    Ok(report)
}

async fn run_probe(state: &AppState, namespace: &str, probe: &str) -> Result<()> {
    let vector = embed_single(&state.http_client, &state.config.embedding, probe)
        .await
        .context("Failed to embed probe query")?;
    let matches = state
        .index
        .query(namespace, vector, PROBE_TOP_K, &QueryFilter::default())
        .await
        .context("Probe query failed")?;

    tracing::info!("Probe '{probe}' returned {} match(es)", matches.len());
    for (rank, m) in matches.iter().enumerate() {
        let excerpt: String = m.text.chars().take(PROBE_EXCERPT_CHARS).collect();
        tracing::info!(
            "  #{} [{:.3}] {}: {}",
            rank + 1,
            m.score,
            m.source.as_deref().unwrap_or("unknown"),
            excerpt.replace('\n', " ")
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn test_state(tmp: &tempfile::TempDir) -> AppState {
        let mut config = Config::default();
        config.data_dir = tmp.path().join("data");
        // Nothing listens here; tests below never reach the embedder
        config.embedding.base_url = "http://127.0.0.1:9".to_string();
        AppState::new(config).unwrap()
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_value(IngestStatus::Ready).unwrap(), "ready");
        assert_eq!(
            serde_json::to_value(IngestStatus::Error("boom".into())).unwrap(),
            serde_json::json!({ "error": "boom" })
        );
    }

    #[test]
    fn test_is_running() {
        assert!(IngestStatus::Loading.is_running());
        assert!(IngestStatus::Embedding.is_running());
        assert!(!IngestStatus::Idle.is_running());
        assert!(!IngestStatus::Ready.is_running());
        assert!(!IngestStatus::Error("x".into()).is_running());
    }

    #[test]
    fn test_begin_ingest_rejects_concurrent_run() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(&tmp);

        let started = begin_ingest(&state).unwrap();
        assert_eq!(started.status, IngestStatus::Loading);
        assert!(started.started_at.is_some());

        let busy = begin_ingest(&state).unwrap_err();
        assert_eq!(busy.status, IngestStatus::Loading);

        finish(&state, IngestStatus::Ready, Some(IngestReport::default()));
        assert!(begin_ingest(&state).is_ok());
    }

    #[tokio::test]
    async fn test_empty_folder_completes_with_zero_vectors() {
        let tmp = tempfile::tempdir().unwrap();
        let docs = tmp.path().join("docs");
        std::fs::create_dir_all(&docs).unwrap();
        std::fs::write(docs.join("image.png"), [0u8, 1, 2]).unwrap();
        let state = test_state(&tmp);

        let report = run_ingest(&state, IngestOptions::new(docs)).await.unwrap();
        assert_eq!(report.files_loaded, 0);
        assert_eq!(report.files_skipped, 1);
        assert_eq!(report.vectors, 0);

        let ingest = state.ingest.read().clone();
        assert_eq!(ingest.status, IngestStatus::Ready);
        assert!(ingest.finished_at.is_some());
        assert_eq!(ingest.report, Some(report));
    }

    #[tokio::test]
    async fn test_ingest_persists_index_once_complete() {
        let models = crate::testing::spawn_models(std::time::Duration::ZERO).await;
        let tmp = tempfile::tempdir().unwrap();
        let docs = tmp.path().join("docs");
        std::fs::create_dir_all(&docs).unwrap();
        std::fs::write(docs.join("juridique_contrat.txt"), "Le contrat de bail.").unwrap();
        std::fs::write(docs.join("budget_2024.md"), "# Budget\n\nLe budget annuel.").unwrap();
        let data_dir = tmp.path().join("data");
        let state = AppState::new(crate::testing::mock_config(&models, &data_dir)).unwrap();

        let report = run_ingest(&state, IngestOptions::new(docs)).await.unwrap();
        assert_eq!(report.files_loaded, 2);
        assert_eq!(report.vectors, 2);

        let reopened =
            crate::index::local::LocalIndex::open_or_create(&state.config.index_dir()).unwrap();
        assert_eq!(reopened.entry_count(), 2);
        let hits = reopened.search("", &[0.0, 1.0], 1, &QueryFilter::default());
        assert_eq!(hits[0].source.as_deref(), Some("budget_2024.md"));
        assert_eq!(hits[0].domain.as_deref(), Some("finance"));
    }

    #[tokio::test]
    async fn test_missing_folder_records_error() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(&tmp);

        let result = run_ingest(&state, IngestOptions::new(tmp.path().join("nope"))).await;
        assert!(result.is_err());
        assert!(matches!(
            state.ingest.read().status,
            IngestStatus::Error(_)
        ));
    }
}
