use ragnest_core::models::{ChunkId, RetrievalResult};
use serde::Serialize;

/// One ranked search match
#[derive(Debug, Serialize)]
pub struct SearchHit {
    pub rank: usize,
    pub score: f32,
    pub chunk_id: u64,
    pub document_id: String,
    pub locator: String,
    pub text: String,
}

impl From<RetrievalResult> for SearchHit {
    fn from(result: RetrievalResult) -> Self {
        Self {
            rank: result.rank,
            score: result.score,
            chunk_id: result.chunk.id.0,
            locator: result.chunk.locator(),
            document_id: result.chunk.metadata.document_id,
            text: result.chunk.content,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub workspace_id: String,
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Serialize)]
pub struct AddChunksResponse {
    pub workspace_id: String,
    pub chunk_ids: Vec<u64>,
}

impl AddChunksResponse {
    pub fn new(workspace_id: &str, ids: Vec<ChunkId>) -> Self {
        Self {
            workspace_id: workspace_id.to_string(),
            chunk_ids: ids.into_iter().map(|id| id.0).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteChunkResponse {
    pub chunk_id: u64,
    /// False when the chunk was already tombstoned
    pub deleted: bool,
}

#[derive(Debug, Serialize)]
pub struct CompactResponse {
    pub workspace_id: String,
    pub removed: usize,
}

#[derive(Debug, Serialize)]
pub struct MountResponse {
    pub workspace_id: String,
    pub mounted: bool,
}
