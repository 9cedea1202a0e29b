use serde::{Deserialize, Serialize};

use super::{GenerationStats, RetrievalResult};

/// Longest source preview kept in an attribution, in characters
const PREVIEW_CHARS: usize = 200;

/// Attribution of a retrieved chunk in a response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceAttribution {
    pub rank: usize,
    pub chunk_id: u64,
    pub document_id: String,
    pub locator: String,
    pub relevance_score: f32,
    pub preview: String,
}

impl SourceAttribution {
    pub fn from_result(result: &RetrievalResult) -> Self {
        Self {
            rank: result.rank,
            chunk_id: result.chunk.id.0,
            document_id: result.chunk.metadata.document_id.clone(),
            locator: result.chunk.locator(),
            relevance_score: result.score,
            preview: preview(&result.chunk.content),
        }
    }
}

/// Final packaging of a non-streaming query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub query: String,
    pub response: String,
    pub sources: Vec<SourceAttribution>,
    /// Characters of assembled context sent to the model
    pub context_length: usize,
    pub elapsed_ms: u64,
    pub generation: GenerationStats,
}

fn preview(content: &str) -> String {
    let trimmed = content.trim();
    if trimmed.chars().count() <= PREVIEW_CHARS {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(PREVIEW_CHARS).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChunkId, ChunkInput, ChunkMetadata, ChunkRecord};

    #[test]
    fn test_attribution_truncates_preview() {
        let long = "é".repeat(500);
        let result = RetrievalResult {
            score: 0.8,
            rank: 1,
            chunk: ChunkRecord::new(
                ChunkId(4),
                ChunkInput::new(long, ChunkMetadata::new("doc-a", 2).with_page(9)),
            ),
        };

        let attribution = SourceAttribution::from_result(&result);
        assert_eq!(attribution.rank, 1);
        assert_eq!(attribution.chunk_id, 4);
        assert_eq!(attribution.locator, "doc-a p.9 #2");
        assert_eq!(attribution.preview.chars().count(), PREVIEW_CHARS + 3);
    }
}
