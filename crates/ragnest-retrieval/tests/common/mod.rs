#![allow(dead_code)]

use ragnest_core::error::{RagError, Result};
use ragnest_core::models::{ChunkInput, ChunkMetadata, GenerationRequest};
use ragnest_llm::{GenerationEngine, HashEmbedder, NativeModel};
use ragnest_retrieval::{RetrievalPipeline, RetrievalSettings};
use ragnest_store::{StoreConfig, WorkspaceStore, WorkspaceVectorStore};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const DIMS: usize = 256;

/// Emits a fixed script of words, optionally pausing and failing part way
pub struct ScriptModel {
    pub words: Vec<String>,
    pub delay: Duration,
    pub fail_after: Option<usize>,
}

impl ScriptModel {
    pub fn new(text: &str) -> Self {
        Self {
            words: text.split(' ').map(|w| format!("{} ", w)).collect(),
            delay: Duration::ZERO,
            fail_after: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }
}

impl NativeModel for ScriptModel {
    fn model_name(&self) -> &str {
        "script"
    }

    fn generate(
        &mut self,
        _request: &GenerationRequest,
        on_token: &mut dyn FnMut(&str) -> ControlFlow<()>,
    ) -> Result<()> {
        for (i, word) in self.words.iter().enumerate() {
            if self.fail_after == Some(i) {
                return Err(RagError::generation("model crashed"));
            }
            std::thread::sleep(self.delay);
            if on_token(word).is_break() {
                break;
            }
        }
        Ok(())
    }
}

pub struct Fixture {
    pub dir: TempDir,
    pub store: Arc<WorkspaceVectorStore>,
    pub pipeline: Arc<RetrievalPipeline>,
}

pub fn fixture(engine: GenerationEngine) -> Fixture {
    fixture_with(engine, RetrievalSettings::default())
}

pub fn fixture_with(engine: GenerationEngine, settings: RetrievalSettings) -> Fixture {
    let dir = TempDir::new().unwrap();
    let embedder = Arc::new(HashEmbedder::new(DIMS).unwrap());
    let store =
        Arc::new(WorkspaceVectorStore::new(StoreConfig::new(dir.path(), DIMS), embedder).unwrap());
    let pipeline = Arc::new(RetrievalPipeline::new(store.clone(), engine, settings));
    Fixture {
        dir,
        store,
        pipeline,
    }
}

/// Index the sky/ocean corpus into `workspace_id`
pub async fn seed(store: &WorkspaceVectorStore, workspace_id: &str) {
    store
        .add(
            workspace_id,
            vec![
                ChunkInput::new("The sky is blue.", ChunkMetadata::new("sky.txt", 0)),
                ChunkInput::new(
                    "The ocean is deep and salty.",
                    ChunkMetadata::new("ocean.pdf", 0).with_page(2),
                ),
                ChunkInput::new(
                    "Whales live in the ocean.",
                    ChunkMetadata::new("ocean.pdf", 1).with_page(3),
                ),
            ],
        )
        .await
        .unwrap();
}
