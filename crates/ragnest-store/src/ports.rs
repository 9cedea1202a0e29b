use async_trait::async_trait;
use ragnest_core::error::Result;
use ragnest_core::models::{ChunkId, ChunkInput, SearchOutcome, WorkspaceStats};

/// Port for per-workspace vector storage and similarity search
///
/// Every operation on a workspace that is not mounted mounts it first.
#[async_trait]
pub trait WorkspaceStore: Send + Sync {
    /// Bring a workspace into memory; no-op when already mounted
    async fn mount(&self, workspace_id: &str) -> Result<()>;

    /// Persist and evict a workspace; no-op when not mounted
    async fn unmount(&self, workspace_id: &str) -> Result<()>;

    /// Embed and index chunks, returning their assigned ids
    async fn add(&self, workspace_id: &str, chunks: Vec<ChunkInput>) -> Result<Vec<ChunkId>>;

    /// Rank live chunks by similarity to `query`
    ///
    /// Returns at most `k` results whose similarity is at least `score_threshold`.
    async fn search(
        &self,
        workspace_id: &str,
        query: &str,
        k: usize,
        score_threshold: f32,
    ) -> Result<SearchOutcome>;

    /// Tombstone a chunk; returns false if it was already deleted
    async fn delete(&self, workspace_id: &str, id: ChunkId) -> Result<bool>;

    /// Physically drop tombstoned chunks, returning how many were removed
    async fn compact(&self, workspace_id: &str) -> Result<usize>;

    async fn stats(&self, workspace_id: &str) -> Result<WorkspaceStats>;

    /// Mounted workspace ids, least recently mounted first
    async fn mounted(&self) -> Vec<String>;
}
