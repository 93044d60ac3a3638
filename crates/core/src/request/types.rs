//! Core book request data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a book request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Waiting for approval.
    Pending,
    /// Approved; a download may be in flight.
    Approved,
    /// Rejected by the approval workflow.
    Rejected,
    /// A download for this request completed.
    Completed,
    /// All download attempts failed.
    DownloadProblem,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Completed => "completed",
            RequestStatus::DownloadProblem => "download_problem",
        }
    }
}

/// An approved (or pending) request for a book, with the bibliographic
/// metadata the matcher scores candidates against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookRequest {
    pub id: String,
    pub title: String,
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn13: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn10: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Preferred file type, e.g. "epub".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_format: Option<String>,
    pub status: RequestStatus,
    /// Why the last download attempt gave up; set while the request is in
    /// `download_problem`, cleared on the next status change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BookRequest {
    /// Create a fresh pending request with a generated id.
    pub fn new(title: impl Into<String>, authors: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            authors,
            isbn13: None,
            isbn10: None,
            year: None,
            language: None,
            requested_format: None,
            status: RequestStatus::Pending,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }
}
