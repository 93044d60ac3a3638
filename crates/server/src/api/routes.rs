use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{downloads, handlers, requests};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Book requests
        .route("/requests", post(requests::create_request))
        .route("/requests", get(requests::list_requests))
        .route("/requests/{id}", get(requests::get_request))
        // Downloads
        .route("/requests/{id}/download", post(downloads::initiate_download))
        .route("/requests/{id}/download", get(downloads::download_status))
        .route("/downloads/{id}/retry", post(downloads::retry_download))
        .route("/reconcile", post(downloads::reconcile))
        .route("/limits/daily", get(downloads::daily_limit))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
}
