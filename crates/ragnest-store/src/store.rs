//! Multi-tenant workspace vector store

use async_trait::async_trait;
use ragnest_core::config::RagConfig;
use ragnest_core::error::{RagError, Result};
use ragnest_core::models::{
    validate_workspace_id, ChunkId, ChunkInput, SearchOutcome, WorkspaceStats,
};
use ragnest_llm::Embedder;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, OwnedRwLockWriteGuard, RwLock};

use crate::persistence::WorkspaceFiles;
use crate::ports::WorkspaceStore;
use crate::workspace::WorkspaceIndex;

/// Settings for [`WorkspaceVectorStore`]
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub dimensions: usize,
    /// Mounted workspaces kept in memory before the oldest is evicted
    pub max_mounted: usize,
}

impl StoreConfig {
    pub fn new(data_dir: impl Into<PathBuf>, dimensions: usize) -> Self {
        Self {
            data_dir: data_dir.into(),
            dimensions,
            max_mounted: 16,
        }
    }

    pub fn with_max_mounted(mut self, max_mounted: usize) -> Self {
        self.max_mounted = max_mounted.max(1);
        self
    }
}

impl From<&RagConfig> for StoreConfig {
    fn from(config: &RagConfig) -> Self {
        Self::new(config.data_dir.value.clone(), config.embedding_dim.value)
            .with_max_mounted(config.max_mounted.value)
    }
}

/// A mounted index and whether it has already been handed back to disk
///
/// Once `retired` is set the index is frozen; writers that were still queued on the
/// lock must resolve the workspace again.
struct Mounted {
    index: WorkspaceIndex,
    retired: bool,
}

impl Mounted {
    fn new(index: WorkspaceIndex) -> Self {
        Self { index, retired: false }
    }
}

type WorkspaceHandle = Arc<RwLock<Mounted>>;

/// A workspace taken out of the mount table that still has to be persisted
struct Retiring {
    workspace_id: String,
    handle: WorkspaceHandle,
    gate: Arc<Mutex<()>>,
    io: Option<OwnedMutexGuard<()>>,
}

#[derive(Default)]
struct MountTable {
    slots: HashMap<String, WorkspaceHandle>,
    /// Mount order, oldest first
    order: VecDeque<String>,
    /// Per-workspace locks serializing loads against the save of an outgoing copy
    gates: HashMap<String, Arc<Mutex<()>>>,
}

impl MountTable {
    fn gate(&mut self, workspace_id: &str) -> Arc<Mutex<()>> {
        self.gates.entry(workspace_id.to_string()).or_default().clone()
    }

    /// Remove a mounted workspace, claiming its gate
    ///
    /// Gates of mounted workspaces are only ever held while the table is locked, so
    /// the claim succeeds immediately.
    fn detach(&mut self, workspace_id: &str) -> Option<Retiring> {
        let handle = self.slots.remove(workspace_id)?;
        self.order.retain(|id| id != workspace_id);
        let gate = self.gate(workspace_id);
        let io = gate.clone().try_lock_owned().ok();
        Some(Retiring {
            workspace_id: workspace_id.to_string(),
            handle,
            gate,
            io,
        })
    }

    fn over_capacity(&mut self, max_mounted: usize) -> Vec<Retiring> {
        let mut retiring = Vec::new();
        while self.slots.len() > max_mounted {
            let Some(oldest) = self.order.front().cloned() else {
                break;
            };
            match self.detach(&oldest) {
                Some(outgoing) => retiring.push(outgoing),
                None => {
                    self.order.pop_front();
                }
            }
        }
        retiring
    }
}

/// Per-workspace vector indexes with file-backed persistence
///
/// The mount table lock is only held to look up, insert or detach handles; disk IO and
/// content operations run under each workspace's own locks. Lock order is always
/// table, then workspace.
pub struct WorkspaceVectorStore {
    config: StoreConfig,
    embedder: Arc<dyn Embedder>,
    table: RwLock<MountTable>,
}

impl WorkspaceVectorStore {
    pub fn new(config: StoreConfig, embedder: Arc<dyn Embedder>) -> Result<Self> {
        if embedder.dimensions() != config.dimensions {
            return Err(RagError::ConfigInvalid {
                key: "embedding_dim".to_string(),
                reason: format!(
                    "embedder '{}' produces {} dimensions, store is configured for {}",
                    embedder.model_name(),
                    embedder.dimensions(),
                    config.dimensions
                ),
            });
        }
        Ok(Self {
            config,
            embedder,
            table: RwLock::new(MountTable::default()),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn files(&self, workspace_id: &str) -> WorkspaceFiles {
        WorkspaceFiles::new(&self.config.data_dir, workspace_id)
    }

    pub async fn is_mounted(&self, workspace_id: &str) -> bool {
        self.table.read().await.slots.contains_key(workspace_id)
    }

    /// Handle for a workspace, mounting it if needed
    async fn handle(&self, workspace_id: &str) -> Result<WorkspaceHandle> {
        validate_workspace_id(workspace_id)?;
        if let Some(handle) = self.table.read().await.slots.get(workspace_id) {
            return Ok(handle.clone());
        }
        self.mount_handle(workspace_id).await
    }

    /// Write access to the live copy of a workspace
    ///
    /// Retries when the handle was retired while this caller waited for the lock.
    async fn write(&self, workspace_id: &str) -> Result<OwnedRwLockWriteGuard<Mounted>> {
        loop {
            let guard = self.handle(workspace_id).await?.write_owned().await;
            if !guard.retired {
                return Ok(guard);
            }
            tracing::debug!(
                workspace_id = %workspace_id,
                "Workspace was unmounted while waiting, remounting"
            );
        }
    }

    async fn mount_handle(&self, workspace_id: &str) -> Result<WorkspaceHandle> {
        let gate = {
            let mut table = self.table.write().await;
            if let Some(handle) = table.slots.get(workspace_id) {
                return Ok(handle.clone());
            }
            table.gate(workspace_id)
        };

        // Waits for an outgoing copy of this workspace to finish saving
        let io = gate.lock_owned().await;
        if let Some(handle) = self.table.read().await.slots.get(workspace_id) {
            return Ok(handle.clone());
        }

        let files = self.files(workspace_id);
        let workspace = match files.load(self.config.dimensions).await? {
            Some(workspace) => {
                tracing::info!(
                    workspace_id = %workspace_id,
                    vectors = workspace.vector_count(),
                    "Workspace loaded"
                );
                workspace
            }
            None => {
                tracing::info!(workspace_id = %workspace_id, "Created empty workspace");
                WorkspaceIndex::empty(workspace_id, self.config.dimensions)
            }
        };

        let handle = Arc::new(RwLock::new(Mounted::new(workspace)));
        let retiring = {
            let mut table = self.table.write().await;
            table.slots.insert(workspace_id.to_string(), handle.clone());
            table.order.push_back(workspace_id.to_string());
            drop(io);
            table.over_capacity(self.config.max_mounted)
        };

        let mut first_error = None;
        for outgoing in retiring {
            tracing::info!(workspace_id = %outgoing.workspace_id, "Evicting workspace to make room");
            if let Err(e) = self.retire(outgoing).await {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(handle),
        }
    }

    /// Persist a detached workspace and freeze its handle
    ///
    /// A failed save puts the workspace back in the table so no acknowledged write is lost.
    async fn retire(&self, outgoing: Retiring) -> Result<()> {
        let Retiring {
            workspace_id,
            handle,
            gate,
            io,
        } = outgoing;
        let io = match io {
            Some(io) => io,
            None => gate.lock_owned().await,
        };

        let saved = {
            let mut mounted = handle.write().await;
            let saved = self.files(&workspace_id).save(&mounted.index).await;
            mounted.retired = saved.is_ok();
            saved
        };

        if let Err(e) = saved {
            tracing::warn!(
                workspace_id = %workspace_id,
                error = %e,
                "Could not persist workspace, keeping it mounted"
            );
            let mut table = self.table.write().await;
            table.slots.insert(workspace_id.clone(), handle);
            table.order.push_front(workspace_id);
            drop(io);
            return Err(e);
        }
        Ok(())
    }

    /// Persist and evict every mounted workspace
    pub async fn unmount_all(&self) -> Result<()> {
        let ids = self.mounted().await;
        for id in ids {
            self.unmount(&id).await?;
        }
        Ok(())
    }

    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let vectors = self.embedder.embed(texts).await?;
        if vectors.len() != texts.len() {
            return Err(RagError::EmbedderUnavailable {
                reason: format!(
                    "embedder returned {} vectors for {} texts",
                    vectors.len(),
                    texts.len()
                ),
                remediation: format!("check the '{}' embedding model", self.embedder.model_name()),
            });
        }
        Ok(vectors)
    }
}

#[async_trait]
impl WorkspaceStore for WorkspaceVectorStore {
    async fn mount(&self, workspace_id: &str) -> Result<()> {
        self.handle(workspace_id).await.map(|_| ())
    }

    async fn unmount(&self, workspace_id: &str) -> Result<()> {
        let Some(outgoing) = self.table.write().await.detach(workspace_id) else {
            return Ok(());
        };
        self.retire(outgoing).await?;
        tracing::info!(workspace_id = %workspace_id, "Workspace unmounted");
        Ok(())
    }

    async fn add(&self, workspace_id: &str, chunks: Vec<ChunkInput>) -> Result<Vec<ChunkId>> {
        self.handle(workspace_id).await?;
        if chunks.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(pos) = chunks.iter().position(|c| c.text.trim().is_empty()) {
            return Err(RagError::validation("chunks", format!("chunk {} has no text", pos)));
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let vectors = self.embed(&texts).await?;

        let mut mounted = self.write(workspace_id).await?;
        let workspace = &mut mounted.index;
        let before = workspace.len();
        let ids = workspace.append(chunks, &vectors)?;

        let files = self.files(workspace_id);
        if let Err(e) = files.save(workspace).await {
            workspace.truncate(before);
            // The index file may already hold the new rows
            if let Err(restore) = files.save(workspace).await {
                tracing::warn!(
                    workspace_id = %workspace_id,
                    error = %restore,
                    "Could not restore persisted state after failed add"
                );
            }
            return Err(e);
        }

        tracing::info!(
            workspace_id = %workspace_id,
            added = ids.len(),
            total = workspace.len(),
            "Chunks indexed"
        );
        Ok(ids)
    }

    async fn search(
        &self,
        workspace_id: &str,
        query: &str,
        k: usize,
        score_threshold: f32,
    ) -> Result<SearchOutcome> {
        if k == 0 {
            return Err(RagError::validation("k", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&score_threshold) {
            return Err(RagError::validation("score_threshold", "must be within [0, 1]"));
        }
        let handle = self.handle(workspace_id).await?;
        let vectors = self.embed(&[query]).await?;
        let Some(query_vector) = vectors.first() else {
            return Ok(SearchOutcome::Empty);
        };

        let mounted = handle.read().await;
        let outcome = mounted.index.search(query_vector, k, score_threshold)?;
        tracing::debug!(
            workspace_id = %workspace_id,
            k,
            score_threshold,
            hits = outcome.len(),
            "Workspace searched"
        );
        Ok(outcome)
    }

    async fn delete(&self, workspace_id: &str, id: ChunkId) -> Result<bool> {
        let mut mounted = self.write(workspace_id).await?;
        let workspace = &mut mounted.index;
        if !workspace.tombstone(id)? {
            return Ok(false);
        }

        if let Err(e) = self.files(workspace_id).save(workspace).await {
            workspace.restore(id);
            return Err(e);
        }
        tracing::info!(workspace_id = %workspace_id, chunk_id = %id, "Chunk deleted");
        Ok(true)
    }

    async fn compact(&self, workspace_id: &str) -> Result<usize> {
        let mut mounted = self.write(workspace_id).await?;
        let workspace = &mut mounted.index;
        let snapshot = workspace.clone();
        let removed = workspace.compact();
        if removed == 0 {
            return Ok(0);
        }

        if let Err(e) = self.files(workspace_id).save(workspace).await {
            *workspace = snapshot;
            return Err(e);
        }
        tracing::info!(workspace_id = %workspace_id, removed, "Workspace compacted");
        Ok(removed)
    }

    async fn stats(&self, workspace_id: &str) -> Result<WorkspaceStats> {
        let handle = self.handle(workspace_id).await?;
        let mounted = handle.read().await;
        Ok(mounted.index.stats())
    }

    async fn mounted(&self) -> Vec<String> {
        self.table.read().await.order.iter().cloned().collect()
    }
}
