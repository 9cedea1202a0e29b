//! One workspace's vectors and their position-aligned records

use ragnest_core::error::{RagError, Result};
use ragnest_core::models::{
    ChunkId, ChunkInput, ChunkRecord, RetrievalResult, SearchOutcome, WorkspaceStats,
};
use std::collections::HashSet;

use crate::flat::{similarity, FlatL2Index};

/// Vector index plus metadata list for a single workspace
///
/// Row `i` of the index always belongs to `records[i]`, and `records[i].id == i`.
/// Deleted records keep their slot as tombstones until [`WorkspaceIndex::compact`].
#[derive(Debug, Clone)]
pub struct WorkspaceIndex {
    workspace_id: String,
    index: FlatL2Index,
    records: Vec<ChunkRecord>,
}

impl WorkspaceIndex {
    pub fn empty(workspace_id: impl Into<String>, dimensions: usize) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            index: FlatL2Index::new(dimensions),
            records: Vec::new(),
        }
    }

    /// Reassemble a persisted pair, checking that the halves agree
    pub fn from_parts(
        workspace_id: impl Into<String>,
        index: FlatL2Index,
        records: Vec<ChunkRecord>,
    ) -> std::result::Result<Self, String> {
        index.validate().map_err(|e| e.to_string())?;
        if index.len() != records.len() {
            return Err(format!(
                "index holds {} vectors but metadata lists {} records",
                index.len(),
                records.len()
            ));
        }
        if let Some((pos, record)) =
            records.iter().enumerate().find(|(pos, r)| r.id.position() != *pos)
        {
            return Err(format!("record at position {} carries id {}", pos, record.id));
        }
        Ok(Self {
            workspace_id: workspace_id.into(),
            index,
            records,
        })
    }

    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    pub fn dimensions(&self) -> usize {
        self.index.dimensions()
    }

    /// Number of slots, tombstones included
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn vector_count(&self) -> usize {
        self.index.len()
    }

    pub fn index(&self) -> &FlatL2Index {
        &self.index
    }

    pub fn records(&self) -> &[ChunkRecord] {
        &self.records
    }

    pub fn get(&self, id: ChunkId) -> Option<&ChunkRecord> {
        self.records.get(id.position())
    }

    fn tombstoned(&self) -> usize {
        self.records.iter().filter(|r| !r.is_live()).count()
    }

    /// Append chunks with their vectors; both grow or neither changes
    pub fn append(&mut self, chunks: Vec<ChunkInput>, vectors: &[Vec<f32>]) -> Result<Vec<ChunkId>> {
        if chunks.len() != vectors.len() {
            return Err(RagError::validation(
                "embedding",
                format!("{} vectors for {} chunks", vectors.len(), chunks.len()),
            ));
        }
        self.index.add(vectors)?;

        let start = self.records.len() as u64;
        let ids: Vec<ChunkId> = (0..chunks.len() as u64).map(|i| ChunkId(start + i)).collect();
        self.records
            .extend(ids.iter().zip(chunks).map(|(id, chunk)| ChunkRecord::new(*id, chunk)));

        debug_assert_eq!(self.index.len(), self.records.len());
        Ok(ids)
    }

    /// Undo appends back to `len` slots
    pub fn truncate(&mut self, len: usize) {
        self.index.truncate(len);
        self.records.truncate(len);
    }

    /// Nearest live records whose similarity clears `threshold`, best first
    pub fn search(&self, query: &[f32], k: usize, threshold: f32) -> Result<SearchOutcome> {
        // Over-fetch so tombstones cannot crowd out live candidates
        let candidates = self.index.search(query, k + self.tombstoned())?;

        let results = candidates
            .into_iter()
            .filter_map(|(row, distance)| {
                let record = self.records.get(row)?;
                record.is_live().then(|| (record, similarity(distance)))
            })
            .take(k)
            .filter(|(_, score)| *score >= threshold)
            .enumerate()
            .map(|(i, (record, score))| RetrievalResult {
                score,
                rank: i + 1,
                chunk: record.clone(),
            })
            .collect();

        Ok(SearchOutcome::from_results(results))
    }

    /// Tombstone a record; false if it was already deleted
    pub fn tombstone(&mut self, id: ChunkId) -> Result<bool> {
        let record = self.records.get_mut(id.position()).ok_or_else(|| {
            RagError::validation("chunk_id", format!("no chunk {} in this workspace", id))
        })?;
        if record.deleted {
            return Ok(false);
        }
        record.deleted = true;
        Ok(true)
    }

    /// Reverse a tombstone set by [`WorkspaceIndex::tombstone`]
    pub fn restore(&mut self, id: ChunkId) {
        if let Some(record) = self.records.get_mut(id.position()) {
            record.deleted = false;
        }
    }

    /// Drop tombstoned slots and renumber the survivors; returns how many were removed
    pub fn compact(&mut self) -> usize {
        let removed = self.tombstoned();
        if removed == 0 {
            return 0;
        }

        let live: Vec<bool> = self.records.iter().map(ChunkRecord::is_live).collect();
        self.index.retain_rows(|row| live[row]);
        self.records.retain(ChunkRecord::is_live);
        for (pos, record) in self.records.iter_mut().enumerate() {
            record.id = ChunkId(pos as u64);
        }

        debug_assert_eq!(self.index.len(), self.records.len());
        removed
    }

    pub fn stats(&self) -> WorkspaceStats {
        let live: Vec<&ChunkRecord> = self.records.iter().filter(|r| r.is_live()).collect();
        let documents: HashSet<&str> =
            live.iter().map(|r| r.metadata.document_id.as_str()).collect();

        WorkspaceStats {
            workspace_id: self.workspace_id.clone(),
            document_count: documents.len(),
            vector_count: self.index.len(),
            live_chunks: live.len(),
            tombstoned: self.records.len() - live.len(),
            dimensions: self.index.dimensions(),
            index_size_bytes: self.index.size_bytes(),
        }
    }
}
