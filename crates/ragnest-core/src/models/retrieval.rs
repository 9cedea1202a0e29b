use serde::{Deserialize, Serialize};

use super::ChunkRecord;

/// One ranked match from a workspace search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Normalized similarity in [0, 1]
    pub score: f32,

    /// 1 = best
    pub rank: usize,

    /// Snapshot of the matching record at search time
    pub chunk: ChunkRecord,
}

/// Result of a search that did not fail
///
/// `Empty` means nothing cleared the threshold; callers decide whether that is terminal.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Found(Vec<RetrievalResult>),
    Empty,
}

impl SearchOutcome {
    /// Build from a ranked list, mapping an empty list to `Empty`
    pub fn from_results(results: Vec<RetrievalResult>) -> Self {
        if results.is_empty() {
            SearchOutcome::Empty
        } else {
            SearchOutcome::Found(results)
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, SearchOutcome::Empty)
    }

    pub fn len(&self) -> usize {
        match self {
            SearchOutcome::Found(results) => results.len(),
            SearchOutcome::Empty => 0,
        }
    }

    pub fn into_results(self) -> Vec<RetrievalResult> {
        match self {
            SearchOutcome::Found(results) => results,
            SearchOutcome::Empty => Vec::new(),
        }
    }
}
