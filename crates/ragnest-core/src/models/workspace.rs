use serde::{Deserialize, Serialize};

use super::EngineStatus;
use crate::error::{RagError, Result};

const MAX_WORKSPACE_ID_LEN: usize = 64;

/// Workspace ids become directory names, so only `[A-Za-z0-9_-]` is accepted
pub fn validate_workspace_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(RagError::validation("workspace_id", "must not be empty"));
    }
    if id.len() > MAX_WORKSPACE_ID_LEN {
        return Err(RagError::validation(
            "workspace_id",
            format!("must be at most {} characters", MAX_WORKSPACE_ID_LEN),
        ));
    }
    if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(RagError::validation(
            "workspace_id",
            format!("'{}' may only contain letters, digits, '_' and '-'", id),
        ));
    }
    Ok(())
}

/// Counters describing one workspace index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceStats {
    pub workspace_id: String,
    /// Distinct source documents with at least one live chunk
    pub document_count: usize,
    /// Vectors in the ANN structure, including orphaned ones
    pub vector_count: usize,
    pub live_chunks: usize,
    pub tombstoned: usize,
    pub dimensions: usize,
    /// Approximate in-memory size of the vector data
    pub index_size_bytes: usize,
}

/// Process health as reported to the transport layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub engine: EngineStatus,
    pub mounted_workspaces: Vec<String>,
}

impl HealthReport {
    pub fn new(engine: EngineStatus, mounted_workspaces: Vec<String>) -> Self {
        let status = match engine {
            EngineStatus::Loaded { .. } => "ok",
            EngineStatus::Degraded { .. } | EngineStatus::NotLoaded => "degraded",
        };
        Self {
            status: status.to_string(),
            engine,
            mounted_workspaces,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_id_rules() {
        assert!(validate_workspace_id("w1").is_ok());
        assert!(validate_workspace_id("team_alpha-2").is_ok());
        assert!(validate_workspace_id("").is_err());
        assert!(validate_workspace_id("../etc").is_err());
        assert!(validate_workspace_id("a/b").is_err());
        assert!(validate_workspace_id(&"x".repeat(65)).is_err());
    }

    #[test]
    fn test_health_status_follows_engine() {
        let report = HealthReport::new(EngineStatus::Loaded { model: "m".into() }, vec![]);
        assert_eq!(report.status, "ok");

        let report = HealthReport::new(EngineStatus::NotLoaded, vec!["w1".into()]);
        assert_eq!(report.status, "degraded");
    }
}
