use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ragnest_core::error::{ErrorCategory, RagError};
use serde::Serialize;

/// Unified API error type
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub kind: &'static str,
    pub message: String,
    pub details: Option<String>,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: ErrorCategory::Validation.as_str(),
            message: message.into(),
            details: None,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
            kind: self.kind,
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        let category = err.category();
        let (status, message) = match category {
            ErrorCategory::Validation => (StatusCode::BAD_REQUEST, "Invalid request"),
            ErrorCategory::NotFound => (StatusCode::NOT_FOUND, "No matching content"),
            ErrorCategory::Unavailable => (StatusCode::SERVICE_UNAVAILABLE, "Service unavailable"),
            ErrorCategory::Timeout => (StatusCode::GATEWAY_TIMEOUT, "Request timed out"),
            ErrorCategory::Internal => {
                tracing::error!(error = %err, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
            }
        };

        Self {
            status,
            kind: category.as_str(),
            message: message.to_string(),
            details: Some(err.to_string()),
        }
    }
}
