use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use ragnest_core::models::ChunkId;

use crate::dto::{AddChunksRequest, AddChunksResponse, DeleteChunkResponse};
use crate::error::ApiError;
use crate::state::AppState;

pub async fn add_chunks(
    State(state): State<Arc<AppState>>,
    Path(workspace_id): Path<String>,
    Json(request): Json<AddChunksRequest>,
) -> Result<(StatusCode, Json<AddChunksResponse>), ApiError> {
    tracing::info!(
        workspace_id = %workspace_id,
        chunk_count = request.chunks.len(),
        "Adding chunks"
    );

    let ids = state.store.add(&workspace_id, request.chunks).await?;

    Ok((StatusCode::CREATED, Json(AddChunksResponse::new(&workspace_id, ids))))
}

pub async fn delete_chunk(
    State(state): State<Arc<AppState>>,
    Path((workspace_id, chunk_id)): Path<(String, u64)>,
) -> Result<Json<DeleteChunkResponse>, ApiError> {
    let deleted = state.store.delete(&workspace_id, ChunkId(chunk_id)).await?;
    Ok(Json(DeleteChunkResponse { chunk_id, deleted }))
}
