use serde::{Deserialize, Serialize};

use crate::ingest::domain::Domain;

/// Text extracted from one page (PDF) or one whole file (other formats).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentPage {
    /// File name the text came from
    pub source: String,
    pub domain: Domain,
    /// 1-based page number, PDFs only
    pub page: Option<usize>,
    pub text: String,
}

/// A single chunk ready to embed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub source: String,
    pub domain: Domain,
    pub page: Option<usize>,
    /// Position of the chunk within its source file
    pub chunk_index: usize,
    pub text: String,
}

/// Chat request sent by the frontend
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default = "default_user_id", alias = "userId")]
    pub user_id: String,
    /// Selects a role profile (namespace, model, domain filter)
    #[serde(default)]
    pub role: Option<String>,
}

fn default_user_id() -> String {
    "anonymous".to_string()
}

/// Chat response returned to the frontend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub sources: Vec<String>,
    pub context: Vec<String>,
}

/// A single chat-completion message (system, user or assistant)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Result of one retrieval-and-answer run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub query: String,
    pub result: String,
    /// Distinct source file names of the top matches
    pub sources: Vec<String>,
    /// Texts of the top matches
    pub context: Vec<String>,
}

impl From<Answer> for ChatResponse {
    fn from(answer: Answer) -> Self {
        Self {
            response: answer.result,
            sources: answer.sources,
            context: answer.context,
        }
    }
}
