//! In-process stand-ins for the embedding and chat APIs, for unit tests.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::config::Config;
use crate::index::IndexRecord;

/// Reply text returned by the mock chat endpoint, padded to check trimming.
pub const MOCK_REPLY: &str = "  Reponse \n";

#[derive(Default)]
struct ModelCalls {
    embedded: Mutex<Vec<String>>,
    chats: Mutex<Vec<Value>>,
    reply_delay: Duration,
}

/// A running mock model server.
pub struct MockModels {
    pub base_url: String,
    calls: Arc<ModelCalls>,
}

impl MockModels {
    /// Texts sent to `/embed`, in arrival order.
    pub fn embedded(&self) -> Vec<String> {
        self.calls.embedded.lock().clone()
    }

    /// Request bodies sent to `/v1/chat/completions`.
    pub fn chats(&self) -> Vec<Value> {
        self.calls.chats.lock().clone()
    }
}

/// 2-dimensional embedding: "contrat" points along x, "budget" along y,
/// anything else is the zero vector.
pub fn keyword_embedding(text: &str) -> Vec<f32> {
    let text = text.to_lowercase();
    match (text.contains("contrat"), text.contains("budget")) {
        (true, false) => vec![1.0, 0.0],
        (false, true) => vec![0.0, 1.0],
        (true, true) => vec![1.0, 1.0],
        (false, false) => vec![0.0, 0.0],
    }
}

async fn embed(State(calls): State<Arc<ModelCalls>>, Json(body): Json<Value>) -> Json<Value> {
    let inputs: Vec<String> = body["inputs"]
        .as_array()
        .map(|a| {
            a.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let vectors: Vec<Vec<f32>> = inputs.iter().map(|t| keyword_embedding(t)).collect();
    calls.embedded.lock().extend(inputs);
    Json(json!(vectors))
}

async fn chat_completions(
    State(calls): State<Arc<ModelCalls>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    tokio::time::sleep(calls.reply_delay).await;
    calls.chats.lock().push(body);
    Json(json!({
        "choices": [{ "message": { "role": "assistant", "content": MOCK_REPLY } }]
    }))
}

/// Start a TEI-style `/embed` and OpenAI-style chat server on a free port.
pub async fn spawn_models(reply_delay: Duration) -> MockModels {
    let calls = Arc::new(ModelCalls {
        reply_delay,
        ..ModelCalls::default()
    });
    let app = Router::new()
        .route("/embed", post(embed))
        .route("/v1/chat/completions", post(chat_completions))
        .with_state(calls.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockModels { base_url, calls }
}

/// Config with a local index under `data_dir` and both model APIs on `models`.
pub fn mock_config(models: &MockModels, data_dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.data_dir = data_dir.to_path_buf();
    config.embedding.base_url = models.base_url.clone();
    config.embedding.dim = 2;
    config.llm.base_url = models.base_url.clone();
    config.llm.api_key = Some("test-key".to_string());
    config
}

pub fn record(id: &str, values: Vec<f32>, source: &str, domain: &str, text: &str) -> IndexRecord {
    IndexRecord {
        id: id.to_string(),
        values,
        text: text.to_string(),
        source: source.to_string(),
        domain: domain.to_string(),
        page: None,
        chunk_index: 0,
    }
}
