use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sequential identifier of a chunk; equal to its position in the workspace index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkId(pub u64);

impl ChunkId {
    pub fn position(&self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for ChunkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Metadata supplied by the ingestion collaborator for one chunk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Identifier of the source document
    pub document_id: String,

    /// Position of this chunk within its source document
    pub chunk_index: usize,

    /// Page number (for paginated sources)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,

    /// Additional properties
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

impl ChunkMetadata {
    pub fn new(document_id: impl Into<String>, chunk_index: usize) -> Self {
        Self {
            document_id: document_id.into(),
            chunk_index,
            page: None,
            properties: HashMap::new(),
        }
    }

    pub fn with_page(mut self, page: usize) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// A chunk handed to the store for indexing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkInput {
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl ChunkInput {
    pub fn new(text: impl Into<String>, metadata: ChunkMetadata) -> Self {
        Self { text: text.into(), metadata }
    }
}

/// Indexed chunk, position-aligned with its vector
///
/// Records are immutable once created; only the tombstone flag changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: ChunkId,

    /// Text content
    pub content: String,

    pub metadata: ChunkMetadata,

    pub indexed_at: DateTime<Utc>,

    #[serde(default)]
    pub deleted: bool,
}

impl ChunkRecord {
    pub fn new(id: ChunkId, input: ChunkInput) -> Self {
        Self {
            id,
            content: input.text,
            metadata: input.metadata,
            indexed_at: Utc::now(),
            deleted: false,
        }
    }

    pub fn is_live(&self) -> bool {
        !self.deleted
    }

    /// Human-readable pointer back to the source, e.g. `report.pdf p.3 #7`
    pub fn locator(&self) -> String {
        match self.metadata.page {
            Some(page) => format!(
                "{} p.{} #{}",
                self.metadata.document_id, page, self.metadata.chunk_index
            ),
            None => format!("{} #{}", self.metadata.document_id, self.metadata.chunk_index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_with_and_without_page() {
        let record = ChunkRecord::new(
            ChunkId(0),
            ChunkInput::new("text", ChunkMetadata::new("report.pdf", 7).with_page(3)),
        );
        assert_eq!(record.locator(), "report.pdf p.3 #7");

        let record =
            ChunkRecord::new(ChunkId(1), ChunkInput::new("text", ChunkMetadata::new("notes", 0)));
        assert_eq!(record.locator(), "notes #0");
        assert!(record.is_live());
    }

    #[test]
    fn test_metadata_deserializes_without_optional_fields() {
        let metadata: ChunkMetadata =
            serde_json::from_str(r#"{"document_id":"doc-1","chunk_index":2}"#).unwrap();
        assert_eq!(metadata.page, None);
        assert!(metadata.properties.is_empty());
    }
}
