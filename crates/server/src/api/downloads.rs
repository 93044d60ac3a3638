//! Download API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use bookhound_core::download::{DailyLimitStatus, DownloadRecord};
use bookhound_core::orchestrator::{DispatchOptions, DownloadOutcome, ReconcileReport};

use super::error::{orchestrator_error, ApiError};
use crate::state::AppState;

/// Response wrapper for download status queries.
#[derive(Debug, Serialize)]
pub struct DownloadStatusResponse {
    pub download: Option<DownloadRecord>,
}

/// Search sources and dispatch (or shortlist) a download for a request.
///
/// The body is optional; an empty one uses the configured priority and
/// auto-selection.
pub async fn initiate_download(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Option<Json<DispatchOptions>>,
) -> Result<(StatusCode, Json<DownloadOutcome>), ApiError> {
    let options = body.map(|Json(options)| options).unwrap_or_default();

    let outcome = state
        .orchestrator()
        .initiate_download(&id, options)
        .await
        .map_err(orchestrator_error)?;

    let status = match outcome {
        DownloadOutcome::Dispatched { .. } => StatusCode::ACCEPTED,
        _ => StatusCode::OK,
    };
    Ok((status, Json(outcome)))
}

/// The most recent download record for a request.
pub async fn download_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DownloadStatusResponse>, ApiError> {
    let download = state
        .orchestrator()
        .download_status(&id)
        .map_err(orchestrator_error)?;

    Ok(Json(DownloadStatusResponse { download }))
}

/// Retry a failed download at its source.
pub async fn retry_download(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<DownloadRecord>), ApiError> {
    let record = state
        .orchestrator()
        .retry_download(&id)
        .await
        .map_err(orchestrator_error)?;

    Ok((StatusCode::ACCEPTED, Json(record)))
}

/// Run one reconciliation sweep immediately.
pub async fn reconcile(State(state): State<Arc<AppState>>) -> Json<ReconcileReport> {
    Json(state.sweeper().reconcile().await)
}

/// Today's usage against the direct archive daily cap.
pub async fn daily_limit(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DailyLimitStatus>, ApiError> {
    state
        .orchestrator()
        .daily_limit()
        .map(Json)
        .map_err(orchestrator_error)
}
