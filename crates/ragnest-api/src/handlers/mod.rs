mod chunks;
mod health;
mod query;
mod workspaces;

use axum::http::HeaderMap;

use crate::error::ApiError;

pub use chunks::{add_chunks, delete_chunk};
pub use health::health_check;
pub use query::{handle_query, handle_search, stream_query};
pub use workspaces::{compact_workspace, mount_workspace, unmount_workspace, workspace_stats};

/// Header carrying the caller identity established by the session layer
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header a client may set to choose the stream's correlation id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

fn user_id(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::bad_request(format!("Missing {} header", USER_ID_HEADER)))
}
