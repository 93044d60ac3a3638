//! Error-to-response mapping for API handlers.

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use bookhound_core::orchestrator::OrchestratorError;
use bookhound_core::request::RequestError;

/// Error response body shared by all endpoints.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

pub fn request_error(e: RequestError) -> ApiError {
    let status = match e {
        RequestError::NotFound(_) => StatusCode::NOT_FOUND,
        RequestError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, e.to_string())
}

pub fn orchestrator_error(e: OrchestratorError) -> ApiError {
    let status = match &e {
        OrchestratorError::RequestNotFound(_) | OrchestratorError::DownloadNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        OrchestratorError::DownloadInProgress(_) | OrchestratorError::InvalidState(_) => {
            StatusCode::CONFLICT
        }
        OrchestratorError::Configuration(_) => StatusCode::UNPROCESSABLE_ENTITY,
        OrchestratorError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
        OrchestratorError::Source(_) => StatusCode::BAD_GATEWAY,
        OrchestratorError::RequestStore(_) | OrchestratorError::DownloadStore(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    error_response(status, e.to_string())
}
