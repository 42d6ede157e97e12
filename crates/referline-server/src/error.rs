//! HTTP error rendering.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use referline_core::error::ReferlineError;
use serde_json::json;
use tracing::error;

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    Domain(ReferlineError),
}

impl From<ReferlineError> for ApiError {
    fn from(err: ReferlineError) -> Self {
        ApiError::Domain(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Domain(err) => match err {
                ReferlineError::Validation { .. } => StatusCode::BAD_REQUEST,
                ReferlineError::NotFound { .. } | ReferlineError::Unresolved { .. } => {
                    StatusCode::NOT_FOUND
                }
                ReferlineError::Conflict { .. } => StatusCode::CONFLICT,
                ReferlineError::Forbidden { .. } => StatusCode::FORBIDDEN,
                ReferlineError::Store(_) | ReferlineError::Internal(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (kind, message) = match self {
            ApiError::Unauthorized(reason) => ("unauthorized", reason),
            ApiError::Domain(err) if status.is_server_error() => {
                error!(error = %err, "Request failed");
                (err.kind(), "internal server error".to_string())
            }
            ApiError::Domain(err) => (err.kind(), err.to_string()),
        };
        (status, Json(json!({ "error": kind, "message": message }))).into_response()
    }
}
