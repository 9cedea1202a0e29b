//! On-disk layout of a workspace: `<data_dir>/<workspace_id>/{index,metadata}.json`
//!
//! Each file is written to a `.tmp` sibling and renamed into place, index first. A crash
//! between the two renames leaves a pair whose counts disagree, which the load-time
//! cross-check reports instead of serving.

use ragnest_core::error::{RagError, Result};
use ragnest_core::models::ChunkRecord;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::flat::FlatL2Index;
use crate::workspace::WorkspaceIndex;

const INDEX_FILE: &str = "index.json";
const METADATA_FILE: &str = "metadata.json";

#[derive(Debug, Serialize, Deserialize)]
struct MetadataFile {
    workspace_id: String,
    records: Vec<ChunkRecord>,
}

/// Paths for one workspace's persisted pair
#[derive(Debug, Clone)]
pub struct WorkspaceFiles {
    workspace_id: String,
    dir: PathBuf,
}

impl WorkspaceFiles {
    pub fn new(data_dir: &Path, workspace_id: &str) -> Self {
        Self {
            workspace_id: workspace_id.to_string(),
            dir: data_dir.join(workspace_id),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.dir.join(METADATA_FILE)
    }

    fn load_error(&self, path: PathBuf, reason: impl Into<String>) -> RagError {
        RagError::WorkspaceLoad {
            workspace_id: self.workspace_id.clone(),
            path,
            reason: reason.into(),
        }
    }

    fn persist_error(&self, reason: impl std::fmt::Display) -> RagError {
        RagError::Persistence {
            workspace_id: self.workspace_id.clone(),
            reason: reason.to_string(),
        }
    }

    /// Load the persisted pair, or `None` when neither file exists
    pub async fn load(&self, dimensions: usize) -> Result<Option<WorkspaceIndex>> {
        let index_path = self.index_path();
        let metadata_path = self.metadata_path();

        let has_index = tokio::fs::try_exists(&index_path)
            .await
            .map_err(|e| self.load_error(index_path.clone(), e.to_string()))?;
        let has_metadata = tokio::fs::try_exists(&metadata_path)
            .await
            .map_err(|e| self.load_error(metadata_path.clone(), e.to_string()))?;

        match (has_index, has_metadata) {
            (false, false) => return Ok(None),
            (true, false) => {
                return Err(self.load_error(metadata_path, "index present without metadata"))
            }
            (false, true) => {
                return Err(self.load_error(index_path, "metadata present without index"))
            }
            (true, true) => {}
        }

        let index: FlatL2Index = self.read_json(&index_path).await?;
        if index.dimensions() != dimensions {
            return Err(self.load_error(
                index_path,
                format!(
                    "index has {} dimensions, configured embedder produces {}",
                    index.dimensions(),
                    dimensions
                ),
            ));
        }

        let metadata: MetadataFile = self.read_json(&metadata_path).await?;
        if metadata.workspace_id != self.workspace_id {
            return Err(self.load_error(
                metadata_path,
                format!("metadata belongs to workspace '{}'", metadata.workspace_id),
            ));
        }

        WorkspaceIndex::from_parts(self.workspace_id.clone(), index, metadata.records)
            .map(Some)
            .map_err(|reason| self.load_error(self.dir.clone(), reason))
    }

    async fn read_json<T: serde::de::DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| self.load_error(path.to_path_buf(), e.to_string()))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| self.load_error(path.to_path_buf(), format!("corrupt file: {}", e)))
    }

    /// Write both files, index first
    pub async fn save(&self, workspace: &WorkspaceIndex) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| self.persist_error(e))?;

        let index = serde_json::to_vec(workspace.index()).map_err(|e| self.persist_error(e))?;
        self.write_atomic(&self.index_path(), &index).await?;

        let metadata = MetadataFile {
            workspace_id: self.workspace_id.clone(),
            records: workspace.records().to_vec(),
        };
        let metadata = serde_json::to_vec(&metadata).map_err(|e| self.persist_error(e))?;
        self.write_atomic(&self.metadata_path(), &metadata).await?;

        tracing::debug!(
            workspace_id = %self.workspace_id,
            vectors = workspace.vector_count(),
            "Workspace persisted"
        );
        Ok(())
    }

    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, bytes)
            .await
            .map_err(|e| self.persist_error(format!("write {}: {}", tmp_path.display(), e)))?;
        tokio::fs::rename(&tmp_path, path)
            .await
            .map_err(|e| self.persist_error(format!("rename {}: {}", path.display(), e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragnest_core::models::{ChunkInput, ChunkMetadata};
    use tempfile::TempDir;

    fn workspace() -> WorkspaceIndex {
        let mut ws = WorkspaceIndex::empty("w1", 2);
        ws.append(
            vec![
                ChunkInput::new("first", ChunkMetadata::new("doc", 0)),
                ChunkInput::new("second", ChunkMetadata::new("doc", 1).with_page(2)),
            ],
            &[vec![0.0, 1.0], vec![1.0, 0.0]],
        )
        .unwrap();
        ws
    }

    #[tokio::test]
    async fn test_missing_pair_loads_as_none() {
        let dir = TempDir::new().unwrap();
        let files = WorkspaceFiles::new(dir.path(), "w1");
        assert!(files.load(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let files = WorkspaceFiles::new(dir.path(), "w1");
        let ws = workspace();
        files.save(&ws).await.unwrap();

        let loaded = files.load(2).await.unwrap().unwrap();
        assert_eq!(loaded.records(), ws.records());
        assert_eq!(loaded.index(), ws.index());
        assert!(!files.index_path().with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_wrong_dimensions_rejected() {
        let dir = TempDir::new().unwrap();
        let files = WorkspaceFiles::new(dir.path(), "w1");
        files.save(&workspace()).await.unwrap();

        let err = files.load(3).await.err().unwrap();
        assert!(matches!(err, RagError::WorkspaceLoad { .. }));
    }

    #[tokio::test]
    async fn test_half_pair_rejected() {
        let dir = TempDir::new().unwrap();
        let files = WorkspaceFiles::new(dir.path(), "w1");
        files.save(&workspace()).await.unwrap();
        std::fs::remove_file(files.metadata_path()).unwrap();

        let err = files.load(2).await.err().unwrap();
        assert!(err.to_string().contains("without metadata"));
    }
}
