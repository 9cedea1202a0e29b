use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use ragnest_core::models::WorkspaceStats;

use crate::dto::{CompactResponse, MountResponse};
use crate::error::ApiError;
use crate::state::AppState;

pub async fn workspace_stats(
    State(state): State<Arc<AppState>>,
    Path(workspace_id): Path<String>,
) -> Result<Json<WorkspaceStats>, ApiError> {
    Ok(Json(state.store.stats(&workspace_id).await?))
}

pub async fn mount_workspace(
    State(state): State<Arc<AppState>>,
    Path(workspace_id): Path<String>,
) -> Result<Json<MountResponse>, ApiError> {
    tracing::info!(workspace_id = %workspace_id, "Mounting workspace");
    state.store.mount(&workspace_id).await?;
    Ok(Json(MountResponse {
        workspace_id,
        mounted: true,
    }))
}

pub async fn unmount_workspace(
    State(state): State<Arc<AppState>>,
    Path(workspace_id): Path<String>,
) -> Result<Json<MountResponse>, ApiError> {
    tracing::info!(workspace_id = %workspace_id, "Unmounting workspace");
    state.store.unmount(&workspace_id).await?;
    Ok(Json(MountResponse {
        workspace_id,
        mounted: false,
    }))
}

pub async fn compact_workspace(
    State(state): State<Arc<AppState>>,
    Path(workspace_id): Path<String>,
) -> Result<Json<CompactResponse>, ApiError> {
    let removed = state.store.compact(&workspace_id).await?;
    tracing::info!(workspace_id = %workspace_id, removed, "Compacted workspace");
    Ok(Json(CompactResponse {
        workspace_id,
        removed,
    }))
}
