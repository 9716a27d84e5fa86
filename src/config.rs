use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address
    pub bind_addr: String,
    /// Origins allowed by CORS. `*` allows any origin.
    pub cors_origins: Vec<String>,
    /// Folder scanned by the ingest pipeline
    pub docs_dir: PathBuf,
    /// Where local index data is stored
    pub data_dir: PathBuf,
    /// Chat-completion provider configuration
    pub llm: LlmConfig,
    /// Embedding provider configuration
    pub embedding: EmbeddingConfig,
    /// Vector index backend configuration
    pub index: IndexConfig,
    /// Chunking and retrieval parameters
    pub retrieval: RetrievalConfig,
    /// Per-role overrides, keyed by lowercase role name
    pub roles: HashMap<String, RoleProfile>,
    /// Maximum concurrent pipeline runs for the chat endpoint
    pub workers: usize,
    /// Upper bound on a single chat request's pipeline run
    pub answer_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "openai" (any OpenAI-compatible API such as Groq) or "ollama"
    pub provider: String,
    /// Base URL for the chat API
    pub base_url: String,
    /// Default chat model
    pub chat_model: String,
    /// API key (only needed for cloud providers)
    pub api_key: Option<String>,
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// "tei" (text-embeddings-inference), "ollama" or "openai"
    pub provider: String,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    /// Embedding vector dimension
    pub dim: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// "local" or "pinecone"
    pub provider: String,
    pub pinecone: PineconeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PineconeConfig {
    pub api_key: Option<String>,
    pub index_name: String,
    /// Serverless region, e.g. "us-east-1"
    pub environment: String,
    pub cloud: String,
    /// Control-plane base URL
    pub controller_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Chunk size in characters
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters
    pub chunk_overlap: usize,
    /// Matches fetched from the index per query
    pub top_k: usize,
    /// Matches reported back as sources and context
    pub context_chunks: usize,
    /// Matches scoring below this are dropped. None keeps everything.
    pub score_threshold: Option<f32>,
}

/// Overrides applied when a chat request carries a matching role.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleProfile {
    /// Index namespace to search
    pub namespace: Option<String>,
    /// Chat model used to answer
    pub chat_model: Option<String>,
    /// Restrict matches to chunks tagged with this domain
    pub domain: Option<String>,
    pub score_threshold: Option<f32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8000".to_string(),
            cors_origins: vec!["http://localhost:3000".to_string()],
            docs_dir: PathBuf::from("./data/docs"),
            data_dir: PathBuf::from("./data"),
            llm: LlmConfig::default(),
            embedding: EmbeddingConfig::default(),
            index: IndexConfig::default(),
            retrieval: RetrievalConfig::default(),
            roles: HashMap::new(),
            workers: 4,
            answer_timeout_secs: 120,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            base_url: "https://api.groq.com/openai".to_string(),
            chat_model: "llama3-8b-8192".to_string(),
            api_key: None,
            temperature: 0.5,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "tei".to_string(),
            base_url: "http://localhost:8080".to_string(),
            model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            api_key: None,
            dim: 384,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            provider: "local".to_string(),
            pinecone: PineconeConfig::default(),
        }
    }
}

impl Default for PineconeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            index_name: "doc-chat".to_string(),
            environment: "us-east-1".to_string(),
            cloud: "aws".to_string(),
            controller_url: "https://api.pinecone.io".to_string(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 100,
            top_k: 4,
            context_chunks: 3,
            score_threshold: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source. `from_env` passes the
    /// process environment; tests pass a map.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("DOC_CHAT_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(origins) = lookup("DOC_CHAT_CORS_ORIGINS") {
            config.cors_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        if let Some(dir) = lookup("DOC_CHAT_DOCS_DIR") {
            config.docs_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("DOC_CHAT_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(v) = parse_var(&lookup, "DOC_CHAT_WORKERS") {
            config.workers = v;
        }
        if let Some(v) = parse_var(&lookup, "DOC_CHAT_ANSWER_TIMEOUT_SECS") {
            config.answer_timeout_secs = v;
        }

        // Retrieval
        if let Some(v) = parse_var(&lookup, "DOC_CHAT_CHUNK_SIZE") {
            config.retrieval.chunk_size = v;
        }
        if let Some(v) = parse_var(&lookup, "DOC_CHAT_CHUNK_OVERLAP") {
            config.retrieval.chunk_overlap = v;
        }
        if let Some(v) = parse_var(&lookup, "DOC_CHAT_TOP_K") {
            config.retrieval.top_k = v;
        }
        if let Some(v) = parse_var(&lookup, "DOC_CHAT_CONTEXT_CHUNKS") {
            config.retrieval.context_chunks = v;
        }
        if let Some(v) = parse_var(&lookup, "DOC_CHAT_SCORE_THRESHOLD") {
            config.retrieval.score_threshold = Some(v);
        }
        if let Some(raw) = lookup("DOC_CHAT_ROLES") {
            match serde_json::from_str::<HashMap<String, RoleProfile>>(&raw) {
                Ok(roles) => {
                    config.roles = roles
                        .into_iter()
                        .map(|(role, profile)| (role.trim().to_lowercase(), profile))
                        .collect();
                }
                Err(e) => tracing::warn!("Ignoring invalid DOC_CHAT_ROLES: {e}"),
            }
        }

        // Chat LLM
        if let Some(provider) = lookup("LLM_PROVIDER") {
            config.llm.provider = provider;
        }
        if let Some(url) = lookup("LLM_BASE_URL") {
            config.llm.base_url = url;
        }
        if let Some(model) = lookup("LLM_CHAT_MODEL") {
            config.llm.chat_model = model;
        }
        if let Some(key) = lookup("LLM_API_KEY").or_else(|| lookup("GROQ_API_KEY")) {
            config.llm.api_key = Some(key);
        }
        if let Some(v) = parse_var(&lookup, "LLM_TEMPERATURE") {
            config.llm.temperature = v;
        }

        // Embeddings
        if let Some(provider) = lookup("EMBEDDING_PROVIDER") {
            config.embedding.provider = provider;
        }
        if let Some(url) = lookup("EMBEDDING_BASE_URL") {
            config.embedding.base_url = url;
        }
        if let Some(model) = lookup("EMBEDDING_MODEL") {
            config.embedding.model = model;
        }
        if let Some(key) = lookup("EMBEDDING_API_KEY") {
            config.embedding.api_key = Some(key);
        }
        if let Some(v) = parse_var(&lookup, "EMBEDDING_DIM") {
            config.embedding.dim = v;
        }

        // Vector index
        if let Some(provider) = lookup("VECTOR_INDEX_PROVIDER") {
            config.index.provider = provider;
        }
        if let Some(key) = lookup("PINECONE_API_KEY") {
            config.index.pinecone.api_key = Some(key);
        }
        if let Some(name) = lookup("PINECONE_INDEX_NAME") {
            config.index.pinecone.index_name = name;
        }
        if let Some(env) = lookup("PINECONE_ENVIRONMENT") {
            config.index.pinecone.environment = env;
        }
        if let Some(cloud) = lookup("PINECONE_CLOUD") {
            config.index.pinecone.cloud = cloud;
        }
        if let Some(url) = lookup("PINECONE_CONTROLLER_URL") {
            config.index.pinecone.controller_url = url;
        }

        config.normalize();
        config
    }

    fn normalize(&mut self) {
        let r = &mut self.retrieval;
        if r.chunk_size == 0 {
            tracing::warn!("Chunk size must be positive, using 500");
            r.chunk_size = 500;
        }
        if r.chunk_overlap >= r.chunk_size {
            let clamped = r.chunk_size / 5;
            tracing::warn!(
                "Chunk overlap {} >= chunk size {}, using {clamped}",
                r.chunk_overlap,
                r.chunk_size
            );
            r.chunk_overlap = clamped;
        }
        self.workers = self.workers.max(1);
        r.top_k = r.top_k.max(1);
    }

    pub fn index_dir(&self) -> PathBuf {
        self.data_dir.join("index")
    }
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}
