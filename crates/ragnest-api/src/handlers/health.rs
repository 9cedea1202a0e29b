use std::sync::Arc;

use axum::{extract::State, Json};
use ragnest_core::models::HealthReport;

use crate::state::AppState;

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthReport> {
    Json(state.pipeline.health().await)
}
