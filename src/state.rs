use parking_lot::RwLock;
use std::sync::Arc;

use crate::config::Config;
use crate::index::VectorIndex;
use crate::ingest::pipeline::IngestState;
use crate::rag::routing::RoleRouter;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub index: Arc<VectorIndex>,
    pub http_client: reqwest::Client,
    pub router: Arc<RoleRouter>,
    /// Bounds concurrent pipeline runs from the chat endpoint
    pub chat_semaphore: Arc<tokio::sync::Semaphore>,
    pub ingest: Arc<RwLock<IngestState>>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(120))
            .build()?;

        // Ensure data directories exist
        if config.index.provider == "local" {
            std::fs::create_dir_all(config.index_dir())?;
        }

        let index = VectorIndex::from_config(&config, http_client.clone())?;
        let router = RoleRouter::new(&config);
        let workers = config.workers;

        Ok(Self {
            config,
            index: Arc::new(index),
            http_client,
            router: Arc::new(router),
            chat_semaphore: Arc::new(tokio::sync::Semaphore::new(workers)),
            ingest: Arc::new(RwLock::new(IngestState::default())),
        })
    }
}
