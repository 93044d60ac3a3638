//! Request storage trait and filter types.

use thiserror::Error;

use super::{BookRequest, RequestStatus};

/// Error type for request store operations.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Request not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),
}

/// Input for creating a new request.
#[derive(Debug, Clone, Default)]
pub struct CreateRequestInput {
    pub title: String,
    pub authors: Vec<String>,
    pub isbn13: Option<String>,
    pub isbn10: Option<String>,
    pub year: Option<i32>,
    pub language: Option<String>,
    pub requested_format: Option<String>,
}

/// Filter for listing requests.
#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    pub limit: i64,
    pub offset: i64,
}

impl RequestFilter {
    pub fn new() -> Self {
        Self {
            status: None,
            limit: 100,
            offset: 0,
        }
    }

    pub fn with_status(mut self, status: RequestStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Trait for request storage backends.
pub trait RequestStore: Send + Sync {
    /// Create a new pending request.
    fn create(&self, input: CreateRequestInput) -> Result<BookRequest, RequestError>;

    /// Get a request by id.
    fn get(&self, id: &str) -> Result<Option<BookRequest>, RequestError>;

    /// List requests matching the filter, newest first.
    fn list(&self, filter: &RequestFilter) -> Result<Vec<BookRequest>, RequestError>;

    /// Update a request's lifecycle status. Clears any stored error
    /// message from an earlier problem.
    fn update_status(&self, id: &str, status: RequestStatus) -> Result<BookRequest, RequestError>;

    /// Move a request to `download_problem` and store the reason.
    fn mark_problem(&self, id: &str, message: &str) -> Result<BookRequest, RequestError>;
}
