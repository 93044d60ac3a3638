//! Book request API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use bookhound_core::request::{BookRequest, CreateRequestInput, RequestFilter, RequestStatus};

use super::error::{error_response, request_error, ApiError};
use crate::state::AppState;

/// Maximum allowed limit for list queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for list queries
const DEFAULT_LIMIT: i64 = 100;

/// Request body for creating a book request
#[derive(Debug, Deserialize)]
pub struct CreateRequestBody {
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    pub isbn13: Option<String>,
    pub isbn10: Option<String>,
    pub year: Option<i32>,
    pub language: Option<String>,
    pub requested_format: Option<String>,
}

/// Query parameters for listing requests
#[derive(Debug, Deserialize)]
pub struct ListRequestsParams {
    /// Filter by lifecycle status
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Response for request operations
#[derive(Debug, Serialize)]
pub struct RequestResponse {
    pub id: String,
    pub title: String,
    pub authors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isbn13: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isbn10: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_format: Option<String>,
    pub status: RequestStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl From<BookRequest> for RequestResponse {
    fn from(request: BookRequest) -> Self {
        Self {
            id: request.id,
            title: request.title,
            authors: request.authors,
            isbn13: request.isbn13,
            isbn10: request.isbn10,
            year: request.year,
            language: request.language,
            requested_format: request.requested_format,
            status: request.status,
            created_at: request.created_at.to_rfc3339(),
            updated_at: request.updated_at.to_rfc3339(),
        }
    }
}

/// Response for listing requests
#[derive(Debug, Serialize)]
pub struct ListRequestsResponse {
    pub requests: Vec<RequestResponse>,
    pub limit: i64,
    pub offset: i64,
}

fn parse_status(raw: &str) -> Option<RequestStatus> {
    match raw {
        "pending" => Some(RequestStatus::Pending),
        "approved" => Some(RequestStatus::Approved),
        "rejected" => Some(RequestStatus::Rejected),
        "completed" => Some(RequestStatus::Completed),
        "download_problem" => Some(RequestStatus::DownloadProblem),
        _ => None,
    }
}

/// Create a new book request
pub async fn create_request(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateRequestBody>,
) -> Result<(StatusCode, Json<RequestResponse>), ApiError> {
    if body.title.trim().is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "title must not be empty",
        ));
    }

    let request = state
        .requests()
        .create(CreateRequestInput {
            title: body.title,
            authors: body.authors,
            isbn13: body.isbn13,
            isbn10: body.isbn10,
            year: body.year,
            language: body.language,
            requested_format: body.requested_format,
        })
        .map_err(request_error)?;

    Ok((StatusCode::CREATED, Json(RequestResponse::from(request))))
}

/// Get a request by id
pub async fn get_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RequestResponse>, ApiError> {
    let request = state
        .requests()
        .get(&id)
        .map_err(request_error)?
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, format!("Request not found: {id}")))?;

    Ok(Json(RequestResponse::from(request)))
}

/// List requests, newest first
pub async fn list_requests(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListRequestsParams>,
) -> Result<Json<ListRequestsResponse>, ApiError> {
    let mut filter = RequestFilter::new()
        .with_limit(params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT))
        .with_offset(params.offset.unwrap_or(0).max(0));

    if let Some(ref raw) = params.status {
        let status = parse_status(raw).ok_or_else(|| {
            error_response(StatusCode::BAD_REQUEST, format!("Unknown status: {raw}"))
        })?;
        filter = filter.with_status(status);
    }

    let requests = state.requests().list(&filter).map_err(request_error)?;

    Ok(Json(ListRequestsResponse {
        requests: requests.into_iter().map(RequestResponse::from).collect(),
        limit: filter.limit,
        offset: filter.offset,
    }))
}
