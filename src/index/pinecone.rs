use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;

use super::{IndexMatch, IndexRecord, QueryFilter};
use crate::config::PineconeConfig;

const API_VERSION: &str = "2024-07";
/// Vectors per upsert request
const UPSERT_BATCH: usize = 100;
const READY_POLL_INTERVAL: Duration = Duration::from_secs(2);
const READY_POLL_ATTEMPTS: usize = 60;

/// Metadata key holding the chunk text.
const TEXT_KEY: &str = "page_content";

/// Managed Pinecone serverless index, reached over its REST API.
pub struct PineconeIndex {
    client: reqwest::Client,
    config: PineconeConfig,
    api_key: String,
    /// Data-plane host, resolved from the control plane on first use
    host: RwLock<Option<String>>,
    poll_interval: Duration,
}

impl PineconeIndex {
    pub fn new(client: reqwest::Client, config: PineconeConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .context("PINECONE_API_KEY is required for the pinecone index provider")?;
        Ok(Self {
            client,
            config,
            api_key,
            host: RwLock::new(None),
            poll_interval: READY_POLL_INTERVAL,
        })
    }

    /// Override the delay between control-plane status checks.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn controller(&self, path: &str) -> String {
        format!(
            "{}{path}",
            self.config.controller_url.trim_end_matches('/')
        )
    }

    fn with_headers(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
    }

    // ─── Control plane ───────────────────────────────────────

    /// Delete the index if it exists, create it again for `dimension`-sized
    /// cosine vectors, and wait until it is ready.
    pub async fn recreate(&self, dimension: usize) -> Result<()> {
        let name = &self.config.index_name;

        if self.list_indexes().await?.iter().any(|n| n == name) {
            tracing::info!("Deleting existing Pinecone index {name}");
            let resp = self
                .with_headers(self.client.delete(self.controller(&format!("/indexes/{name}"))))
                .send()
                .await
                .context("Failed to call Pinecone delete index")?;
            check_status(resp, "delete index").await?;
            // Deletion is asynchronous and the name stays taken until it finishes
            self.wait_until_deleted().await?;
        }

        tracing::info!("Creating Pinecone index {name} (dimension {dimension})");
        let body = create_index_body(&self.config, dimension);
        let resp = self
            .with_headers(self.client.post(self.controller("/indexes")))
            .json(&body)
            .send()
            .await
            .context("Failed to call Pinecone create index")?;
        check_status(resp, "create index").await?;

        *self.host.write() = None;
        for attempt in 1..=READY_POLL_ATTEMPTS {
            let description = self.describe_index().await?;
            if description.status.ready {
                *self.host.write() = Some(normalize_host(&description.host));
                tracing::info!("Pinecone index {name} ready after {attempt} check(s)");
                return Ok(());
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        anyhow::bail!("Pinecone index {name} was not ready in time")
    }

    async fn wait_until_deleted(&self) -> Result<()> {
        let name = &self.config.index_name;
        for attempt in 1..=READY_POLL_ATTEMPTS {
            if !self.list_indexes().await?.iter().any(|n| n == name) {
                tracing::info!("Pinecone index {name} deleted after {attempt} check(s)");
                return Ok(());
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        anyhow::bail!("Pinecone index {name} was not deleted in time")
    }

    async fn list_indexes(&self) -> Result<Vec<String>> {
        let resp = self
            .with_headers(self.client.get(self.controller("/indexes")))
            .send()
            .await
            .context("Failed to call Pinecone list indexes")?;
        let resp = check_status(resp, "list indexes").await?;
        let list: IndexList = resp
            .json()
            .await
            .context("Failed to parse Pinecone index list")?;
        Ok(list.indexes.into_iter().map(|i| i.name).collect())
    }

    async fn describe_index(&self) -> Result<IndexDescription> {
        let url = self.controller(&format!("/indexes/{}", self.config.index_name));
        let resp = self
            .with_headers(self.client.get(url))
            .send()
            .await
            .context("Failed to call Pinecone describe index")?;
        let resp = check_status(resp, "describe index").await?;
        resp.json()
            .await
            .context("Failed to parse Pinecone index description")
    }

    async fn data_url(&self, path: &str) -> Result<String> {
        let cached = self.host.read().clone();
        if let Some(host) = cached {
            return Ok(format!("{host}{path}"));
        }
        let description = self.describe_index().await?;
        let host = normalize_host(&description.host);
        *self.host.write() = Some(host.clone());
        Ok(format!("{host}{path}"))
    }

    // ─── Data plane ──────────────────────────────────────────

    pub async fn upsert(&self, namespace: &str, records: Vec<IndexRecord>) -> Result<usize> {
        let url = self.data_url("/vectors/upsert").await?;
        let mut written = 0;

        for batch in records.chunks(UPSERT_BATCH) {
            let body = upsert_body(namespace, batch);
            let resp = self
                .with_headers(self.client.post(&url))
                .json(&body)
                .send()
                .await
                .context("Failed to call Pinecone upsert")?;
            let resp = check_status(resp, "upsert").await?;
            let parsed: UpsertResponse = resp
                .json()
                .await
                .context("Failed to parse Pinecone upsert response")?;
            written += parsed.upserted_count;
        }

        Ok(written)
    }

    pub async fn query(
        &self,
        namespace: &str,
        vector: Vec<f32>,
        top_k: usize,
        filter: &QueryFilter,
    ) -> Result<Vec<IndexMatch>> {
        let url = self.data_url("/query").await?;
        let body = query_body(namespace, vector, top_k, filter);

        let resp = self
            .with_headers(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .context("Failed to call Pinecone query")?;
        let resp = check_status(resp, "query").await?;
        let body = resp
            .text()
            .await
            .context("Failed to read Pinecone query response")?;
        parse_query_response(&body)
    }

    pub async fn count(&self) -> Result<usize> {
        let url = self.data_url("/describe_index_stats").await?;
        let resp = self
            .with_headers(self.client.post(&url))
            .json(&json!({}))
            .send()
            .await
            .context("Failed to call Pinecone index stats")?;
        let resp = check_status(resp, "describe index stats").await?;
        let stats: IndexStats = resp
            .json()
            .await
            .context("Failed to parse Pinecone index stats")?;
        Ok(stats.total_vector_count)
    }
}

async fn check_status(resp: reqwest::Response, operation: &str) -> Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    anyhow::bail!("Pinecone {operation} returned {status}: {body}")
}

/// The control plane reports hosts without a scheme.
fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

// ─── Wire types ──────────────────────────────────────────

#[derive(Deserialize)]
struct IndexList {
    #[serde(default)]
    indexes: Vec<IndexSummary>,
}

#[derive(Deserialize)]
struct IndexSummary {
    name: String,
}

#[derive(Deserialize)]
struct IndexDescription {
    #[serde(default)]
    host: String,
    status: IndexStatus,
}

#[derive(Deserialize)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexStats {
    #[serde(default)]
    total_vector_count: usize,
}

#[derive(Serialize)]
struct PineconeVector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: Map<String, Value>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Map<String, Value>,
}

fn create_index_body(config: &PineconeConfig, dimension: usize) -> Value {
    json!({
        "name": config.index_name,
        "dimension": dimension,
        "metric": "cosine",
        "spec": {
            "serverless": {
                "cloud": config.cloud,
                "region": config.environment,
            }
        }
    })
}

fn record_metadata(record: &IndexRecord) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert(TEXT_KEY.into(), Value::from(record.text.as_str()));
    metadata.insert("source".into(), Value::from(record.source.as_str()));
    metadata.insert("domain".into(), Value::from(record.domain.as_str()));
    metadata.insert("chunk_index".into(), Value::from(record.chunk_index));
    // Pinecone rejects null metadata values
    if let Some(page) = record.page {
        metadata.insert("page".into(), Value::from(page));
    }
    metadata
}

fn upsert_body(namespace: &str, records: &[IndexRecord]) -> Value {
    let vectors: Vec<PineconeVector> = records
        .iter()
        .map(|r| PineconeVector {
            id: &r.id,
            values: &r.values,
            metadata: record_metadata(r),
        })
        .collect();
    json!({ "vectors": vectors, "namespace": namespace })
}

fn query_body(namespace: &str, vector: Vec<f32>, top_k: usize, filter: &QueryFilter) -> Value {
    let mut body = json!({
        "vector": vector,
        "topK": top_k,
        "includeMetadata": true,
        "includeValues": false,
        "namespace": namespace,
    });
    if let Some(domain) = &filter.domain {
        body["filter"] = json!({ "domain": { "$eq": domain } });
    }
    body
}

fn parse_query_response(body: &str) -> Result<Vec<IndexMatch>> {
    let parsed: QueryResponse =
        serde_json::from_str(body).context("Failed to parse Pinecone query response")?;

    Ok(parsed
        .matches
        .into_iter()
        .map(|m| {
            let string_field = |key: &str| {
                m.metadata
                    .get(key)
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            };
            IndexMatch {
                text: string_field(TEXT_KEY).unwrap_or_default(),
                source: string_field("source"),
                domain: string_field("domain"),
                page: m
                    .metadata
                    .get("page")
                    .and_then(Value::as_f64)
                    .map(|p| p as usize),
                id: m.id,
                score: m.score,
            }
        })
        .collect())
}
