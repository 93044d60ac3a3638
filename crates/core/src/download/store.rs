//! Download storage trait.

use thiserror::Error;

use super::{DownloadRecord, DownloadStatus, SearchMethod, SourceRef};

/// Error type for download store operations.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Download not found: {0}")]
    NotFound(String),

    #[error("Request {0} already has a download in flight")]
    AlreadyInFlight(String),

    #[error("Download {0} is already in a terminal state")]
    AlreadyTerminal(String),

    #[error("Download {0} has not failed, nothing to reopen")]
    NotFailed(String),

    #[error("Database error: {0}")]
    Database(String),
}

/// Input for creating a new download record.
#[derive(Debug, Clone)]
pub struct CreateDownloadInput {
    pub request_id: String,
    pub source: SourceRef,
    pub search_method: SearchMethod,
    pub confidence: Option<u8>,
}

/// Trait for download storage backends.
///
/// Implementations must reject `create` when the request already has a
/// record in a non-terminal state.
pub trait DownloadStore: Send + Sync {
    fn create(&self, input: CreateDownloadInput) -> Result<DownloadRecord, DownloadError>;

    fn get(&self, id: &str) -> Result<Option<DownloadRecord>, DownloadError>;

    /// Most recent record for a request, terminal or not.
    fn latest_for_request(&self, request_id: &str)
        -> Result<Option<DownloadRecord>, DownloadError>;

    /// The non-terminal record for a request, if one exists.
    fn active_for_request(&self, request_id: &str)
        -> Result<Option<DownloadRecord>, DownloadError>;

    /// All records in a non-terminal state, oldest first.
    fn list_in_flight(&self) -> Result<Vec<DownloadRecord>, DownloadError>;

    /// Transitions below fail with `AlreadyTerminal` when the record has
    /// already completed or failed, so two pollers racing on the same job
    /// settle it exactly once.
    fn mark_downloading(&self, id: &str) -> Result<DownloadRecord, DownloadError>;

    fn mark_completed(
        &self,
        id: &str,
        file_path: Option<&str>,
        file_size: Option<i64>,
    ) -> Result<DownloadRecord, DownloadError>;

    fn mark_failed(&self, id: &str, error: &str) -> Result<DownloadRecord, DownloadError>;

    /// Put a `failed` record back in flight for a retry, clearing the
    /// error and any stale file details. `status` must be non-terminal.
    /// Fails with `AlreadyInFlight` when the request has grown another
    /// active record in the meantime.
    fn reopen(&self, id: &str, status: DownloadStatus)
        -> Result<DownloadRecord, DownloadError>;

    /// Atomically bump and return the completion count for a UTC day.
    /// The date is formatted `YYYY-MM-DD`.
    fn increment_daily_count(&self, date: &str) -> Result<i64, DownloadError>;

    /// Completion count recorded for a UTC day.
    fn daily_count(&self, date: &str) -> Result<i64, DownloadError>;
}
