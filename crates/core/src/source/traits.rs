//! The trait every book source implements.

use async_trait::async_trait;

use super::types::{BookCandidate, JobRef, JobStatus, SourceError, SourceKind};

/// A system books can be acquired from.
///
/// Search returns candidates; `submit` starts a transfer and returns a job
/// handle the caller polls through `job_status`. Adapters are stateless
/// between calls, all durable state lives in the download store.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Short name used in logs and download records.
    fn name(&self) -> &str;

    fn kind(&self) -> SourceKind;

    /// Exact lookup by ISBN (10 or 13, separators allowed).
    async fn search_by_identifier(&self, isbn: &str) -> Result<Vec<BookCandidate>, SourceError>;

    /// Free-text lookup by title, optionally narrowed by author.
    async fn search_by_text(
        &self,
        title: &str,
        author: Option<&str>,
    ) -> Result<Vec<BookCandidate>, SourceError>;

    /// Start acquiring a candidate. Returns the source-side job handle.
    async fn submit(&self, candidate: &BookCandidate) -> Result<JobRef, SourceError>;

    /// Current state of a previously submitted job.
    async fn job_status(&self, job_id: &str) -> Result<JobStatus, SourceError>;

    /// Ask the source to retry a failed job in place. Returns false when the
    /// source does not support in-place retry and the caller must resubmit.
    async fn retry_job(&self, job_id: &str) -> Result<bool, SourceError>;
}
