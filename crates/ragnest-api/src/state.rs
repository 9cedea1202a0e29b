use ragnest_core::config::RagConfig;
use ragnest_core::error::Result;
use ragnest_llm::{build_embedder, load_engine};
use ragnest_retrieval::{ResponseStreamer, RetrievalPipeline, RetrievalSettings, StreamSettings};
use ragnest_store::{StoreConfig, WorkspaceStore, WorkspaceVectorStore};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn WorkspaceStore>,
    pub pipeline: Arc<RetrievalPipeline>,
    pub streamer: ResponseStreamer,
}

impl AppState {
    pub fn new(pipeline: Arc<RetrievalPipeline>, streamer: ResponseStreamer) -> Self {
        Self {
            store: pipeline.store().clone(),
            pipeline,
            streamer,
        }
    }

    /// Wire the store, engine and pipeline described by `config`
    ///
    /// A generator that cannot be loaded leaves the engine degraded rather than failing.
    pub async fn build(config: &RagConfig, ollama_url: &str) -> Result<Self> {
        let embedder = build_embedder(&config.embedder.value, config.embedding_dim.value, ollama_url)?;
        let store = Arc::new(WorkspaceVectorStore::new(StoreConfig::from(config), embedder)?);
        let engine = load_engine(&config.generator.value, ollama_url).await?;

        let pipeline = Arc::new(RetrievalPipeline::new(
            store,
            engine,
            RetrievalSettings::from(config),
        ));
        Ok(Self::new(pipeline, ResponseStreamer::new(StreamSettings::from(config))))
    }

    /// Unmount every workspace, persisting each one
    pub async fn shutdown(&self) {
        for workspace_id in self.store.mounted().await {
            if let Err(e) = self.store.unmount(&workspace_id).await {
                tracing::error!(
                    workspace_id = %workspace_id,
                    error = %e,
                    "Failed to persist workspace on shutdown"
                );
            }
        }
    }
}
