use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Create the API router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health
        .route("/health", get(handlers::health_check))

        // Queries (workspace-scoped)
        .route("/api/v1/workspaces/{workspace_id}/query", post(handlers::handle_query))
        .route("/api/v1/workspaces/{workspace_id}/query/stream", post(handlers::stream_query))
        .route("/api/v1/workspaces/{workspace_id}/search", post(handlers::handle_search))

        // Workspace lifecycle
        .route("/api/v1/workspaces/{workspace_id}/stats", get(handlers::workspace_stats))
        .route("/api/v1/workspaces/{workspace_id}/mount", post(handlers::mount_workspace))
        .route("/api/v1/workspaces/{workspace_id}/unmount", post(handlers::unmount_workspace))
        .route("/api/v1/workspaces/{workspace_id}/compact", post(handlers::compact_workspace))

        // Chunks
        .route("/api/v1/workspaces/{workspace_id}/chunks", post(handlers::add_chunks))
        .route(
            "/api/v1/workspaces/{workspace_id}/chunks/{chunk_id}",
            delete(handlers::delete_chunk),
        )

        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
