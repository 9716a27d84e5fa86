//! Vector index: stores (vector, text, metadata) records and answers cosine
//! nearest-neighbour queries. Two backends, picked by `VECTOR_INDEX_PROVIDER`:
//! an in-process store persisted to disk, and a managed Pinecone index.

pub mod local;
pub mod pinecone;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::Config;
use crate::models::Chunk;
use local::LocalIndex;
use pinecone::PineconeIndex;

/// One vector with its chunk text and metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub text: String,
    pub source: String,
    pub domain: String,
    pub page: Option<usize>,
    pub chunk_index: usize,
}

impl IndexRecord {
    /// Build a record for `chunk` with a fresh random id.
    pub fn from_chunk(chunk: &Chunk, values: Vec<f32>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            values,
            text: chunk.text.clone(),
            source: chunk.source.clone(),
            domain: chunk.domain.to_string(),
            page: chunk.page,
            chunk_index: chunk.chunk_index,
        }
    }
}

/// A query result, most similar first
#[derive(Debug, Clone, PartialEq)]
pub struct IndexMatch {
    pub id: String,
    /// Cosine similarity
    pub score: f32,
    pub text: String,
    /// None when the stored record has no source metadata
    pub source: Option<String>,
    pub domain: Option<String>,
    pub page: Option<usize>,
}

/// Metadata restrictions applied to a query
#[derive(Debug, Clone, Default)]
pub struct QueryFilter {
    /// Only match chunks with this exact domain tag
    pub domain: Option<String>,
}

pub enum VectorIndex {
    Local(Arc<LocalIndex>),
    Pinecone(PineconeIndex),
}

impl VectorIndex {
    /// Open the backend selected in `config`.
    pub fn from_config(config: &Config, client: reqwest::Client) -> Result<Self> {
        match config.index.provider.as_str() {
            "local" => Ok(VectorIndex::Local(Arc::new(LocalIndex::open_or_create(
                &config.index_dir(),
            )?))),
            "pinecone" => Ok(VectorIndex::Pinecone(PineconeIndex::new(
                client,
                config.index.pinecone.clone(),
            )?)),
            other => anyhow::bail!("Unknown vector index provider: {other}"),
        }
    }

    pub fn provider(&self) -> &'static str {
        match self {
            VectorIndex::Local(_) => "local",
            VectorIndex::Pinecone(_) => "pinecone",
        }
    }

    /// Drop every record and recreate the index for vectors of `dimension`.
    pub async fn reset(&self, dimension: usize) -> Result<()> {
        match self {
            VectorIndex::Local(index) => {
                let index = index.clone();
                tokio::task::spawn_blocking(move || index.clear()).await?
            }
            VectorIndex::Pinecone(index) => index.recreate(dimension).await,
        }
    }

    /// Insert or replace records in `namespace`. Returns the number written.
    pub async fn upsert(&self, namespace: &str, records: Vec<IndexRecord>) -> Result<usize> {
        match self {
            VectorIndex::Local(index) => {
                let index = index.clone();
                let namespace = namespace.to_string();
                tokio::task::spawn_blocking(move || index.upsert(&namespace, records)).await?
            }
            VectorIndex::Pinecone(index) => index.upsert(namespace, records).await,
        }
    }

    /// Persist pending writes. Pinecone writes are durable on upsert.
    pub async fn flush(&self) -> Result<()> {
        match self {
            VectorIndex::Local(index) => {
                let index = index.clone();
                tokio::task::spawn_blocking(move || index.flush()).await?
            }
            VectorIndex::Pinecone(_) => Ok(()),
        }
    }

    /// The `top_k` records in `namespace` most similar to `vector`.
    pub async fn query(
        &self,
        namespace: &str,
        vector: Vec<f32>,
        top_k: usize,
        filter: &QueryFilter,
    ) -> Result<Vec<IndexMatch>> {
        match self {
            VectorIndex::Local(index) => {
                // Brute-force scan; keep it off the async workers
                let index = index.clone();
                let namespace = namespace.to_string();
                let filter = filter.clone();
                Ok(tokio::task::spawn_blocking(move || {
                    index.search(&namespace, &vector, top_k, &filter)
                })
                .await?)
            }
            VectorIndex::Pinecone(index) => index.query(namespace, vector, top_k, filter).await,
        }
    }

    /// Total number of stored vectors across namespaces.
    pub async fn count(&self) -> Result<usize> {
        match self {
            VectorIndex::Local(index) => Ok(index.entry_count()),
            VectorIndex::Pinecone(index) => index.count().await,
        }
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}
