use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::sse::{Event, Sse},
    Json,
};
use futures::{Stream, StreamExt};
use ragnest_core::models::{QueryOutcome, StreamFrame};
use ragnest_retrieval::ResponseStreamer;
use uuid::Uuid;

use super::{user_id, REQUEST_ID_HEADER};
use crate::dto::{QueryRequest, SearchHit, SearchRequest, SearchResponse};
use crate::error::ApiError;
use crate::state::AppState;

pub async fn handle_query(
    State(state): State<Arc<AppState>>,
    Path(workspace_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryOutcome>, ApiError> {
    let user = user_id(&headers)?;
    tracing::info!(
        workspace_id = %workspace_id,
        user_id = %user,
        query = %request.text,
        top_k = ?request.top_k,
        "Processing query request"
    );

    let plan = request.into_plan(&workspace_id, &user);
    let outcome = state.pipeline.query(&plan).await?;

    Ok(Json(outcome))
}

/// Server-sent events carrying the frame protocol
///
/// Failures after the headers are sent arrive as the stream's `error` frame.
pub async fn stream_query(
    State(state): State<Arc<AppState>>,
    Path(workspace_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<QueryRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let user = user_id(&headers)?;
    let correlation_id = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    tracing::info!(
        workspace_id = %workspace_id,
        user_id = %user,
        correlation_id = %correlation_id,
        "Starting streaming query"
    );

    let streamer = if request.progress {
        ResponseStreamer::new(state.streamer.settings().clone().with_progress(true))
    } else {
        state.streamer.clone()
    };
    let plan = request.into_plan(&workspace_id, &user);
    let frames = streamer.stream_query(state.pipeline.clone(), plan, Some(correlation_id));

    Ok(Sse::new(frames.map(|frame| Ok(to_event(frame)))))
}

pub async fn handle_search(
    State(state): State<Arc<AppState>>,
    Path(workspace_id): Path<String>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let results = state
        .pipeline
        .search(&workspace_id, &request.text, request.top_k, request.min_score)
        .await?;

    Ok(Json(SearchResponse {
        workspace_id,
        results: results.into_iter().map(SearchHit::from).collect(),
    }))
}

fn to_event(frame: StreamFrame) -> Event {
    // axum rejects carriage returns in event fields
    let event = Event::default()
        .event(frame.kind.as_str())
        .data(frame.data.replace('\r', ""));
    match frame.id {
        Some(id) => event.id(id.replace(['\r', '\n'], "")),
        None => event,
    }
}
