// src/api/error.rs

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use crate::errors::TestdriveError;

/// Error returned by the HTTP handlers, rendered as `{"detail": "..."}`.
///
/// Only curated messages reach the client; anything unexpected is logged
/// and reported as a plain 500.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, detail)
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl From<TestdriveError> for ApiError {
    fn from(err: TestdriveError) -> Self {
        match err {
            TestdriveError::RunNotFound(_) => Self::not_found("Run not found"),
            TestdriveError::ResultNotFound(_) => Self::not_found("Results not found"),
            TestdriveError::ExperimentNotFound(_) => Self::not_found("Experiment not found"),
            TestdriveError::ExecutorAtCapacity(_) => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "Too many experiments running; try again later",
            ),
            TestdriveError::StartupConflict(_) | TestdriveError::RunTerminal { .. } => {
                Self::new(StatusCode::CONFLICT, err.to_string())
            }
            other => {
                error!(error = %other, "internal error while handling request");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}
