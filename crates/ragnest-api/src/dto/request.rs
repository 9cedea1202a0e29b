use std::time::Duration;

use ragnest_core::models::ChunkInput;
use ragnest_retrieval::QueryPlan;
use serde::Deserialize;

/// Query request body
///
/// Omitted fields fall back to the server defaults.
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub text: String,
    pub top_k: Option<usize>,
    pub min_score: Option<f32>,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
    pub timeout_ms: Option<u64>,
    /// Emit `progress` frames on the streaming endpoint
    #[serde(default)]
    pub progress: bool,
}

impl QueryRequest {
    pub fn into_plan(self, workspace_id: &str, user_id: &str) -> QueryPlan {
        let mut plan = QueryPlan::new(workspace_id, user_id, self.text);
        plan.top_k = self.top_k;
        plan.min_score = self.min_score;
        plan.max_tokens = self.max_tokens;
        plan.temperature = self.temperature;
        plan.timeout = self.timeout_ms.map(Duration::from_millis);
        plan
    }
}

/// Retrieval-only request body
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub text: String,
    pub top_k: Option<usize>,
    pub min_score: Option<f32>,
}

/// Chunks produced by the ingestion side, appended in order
#[derive(Debug, Deserialize)]
pub struct AddChunksRequest {
    pub chunks: Vec<ChunkInput>,
}
