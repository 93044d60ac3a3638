//! Mock source adapter for testing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::source::{
    BookCandidate, JobRef, JobState, JobStatus, SourceAdapter, SourceError, SourceKind,
};

/// A recorded search call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedSearch {
    /// The ISBN or query text that was searched.
    pub query: String,
    pub by_identifier: bool,
}

/// A recorded submit call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedSubmit {
    pub candidate_id: String,
}

/// Mock implementation of the SourceAdapter trait.
///
/// Searches return whatever candidates were seeded; submitted candidates
/// get a job whose state the test controls with [`set_job_state`].
///
/// [`set_job_state`]: MockSourceAdapter::set_job_state
pub struct MockSourceAdapter {
    name: String,
    kind: SourceKind,
    /// Candidates returned by identifier searches.
    isbn_results: Arc<RwLock<Vec<BookCandidate>>>,
    /// Candidates returned by text searches.
    text_results: Arc<RwLock<Vec<BookCandidate>>>,
    /// Job states by job id.
    jobs: Arc<RwLock<HashMap<String, JobStatus>>>,
    /// Recorded search calls.
    searches: Arc<RwLock<Vec<RecordedSearch>>>,
    /// Recorded submit calls.
    submits: Arc<RwLock<Vec<RecordedSubmit>>>,
    /// If set, every search fails with an API error carrying this message.
    search_error: Arc<RwLock<Option<String>>>,
    /// If set, every submit fails with an API error carrying this message.
    submit_error: Arc<RwLock<Option<String>>>,
    /// What retry_job answers for known jobs.
    retry_supported: Arc<RwLock<bool>>,
}

impl MockSourceAdapter {
    pub fn new(kind: SourceKind) -> Self {
        let name = match kind {
            SourceKind::DirectArchive => "mock_archive",
            SourceKind::IndexerClient => "mock_indexer",
        };
        Self {
            name: name.to_string(),
            kind,
            isbn_results: Arc::new(RwLock::new(Vec::new())),
            text_results: Arc::new(RwLock::new(Vec::new())),
            jobs: Arc::new(RwLock::new(HashMap::new())),
            searches: Arc::new(RwLock::new(Vec::new())),
            submits: Arc::new(RwLock::new(Vec::new())),
            search_error: Arc::new(RwLock::new(None)),
            submit_error: Arc::new(RwLock::new(None)),
            retry_supported: Arc::new(RwLock::new(true)),
        }
    }

    /// Seed candidates returned by identifier searches.
    pub async fn set_isbn_results(&self, candidates: Vec<BookCandidate>) {
        *self.isbn_results.write().await = candidates;
    }

    /// Seed candidates returned by text searches.
    pub async fn set_text_results(&self, candidates: Vec<BookCandidate>) {
        *self.text_results.write().await = candidates;
    }

    /// Make every search fail.
    pub async fn fail_searches(&self, message: &str) {
        *self.search_error.write().await = Some(message.to_string());
    }

    /// Make every submit fail.
    pub async fn fail_submits(&self, message: &str) {
        *self.submit_error.write().await = Some(message.to_string());
    }

    /// Control what retry_job reports.
    pub async fn set_retry_supported(&self, supported: bool) {
        *self.retry_supported.write().await = supported;
    }

    /// Move a submitted job to a new state.
    pub async fn set_job_state(&self, job_id: &str, state: JobState) {
        let mut jobs = self.jobs.write().await;
        let status = jobs.entry(job_id.to_string()).or_insert(JobStatus {
            state: JobState::Queued,
            file_path: None,
            file_size: None,
            error: None,
        });
        status.state = state;
        if state == JobState::Completed {
            status.file_path = Some(format!("/mock/books/{}.epub", job_id));
            status.file_size = Some(1024);
        }
        if state == JobState::Failed {
            status.error = Some("mock transfer failed".to_string());
        }
    }

    /// Drop a job entirely, as if the source forgot it.
    pub async fn forget_job(&self, job_id: &str) {
        self.jobs.write().await.remove(job_id);
    }

    pub async fn recorded_searches(&self) -> Vec<RecordedSearch> {
        self.searches.read().await.clone()
    }

    pub async fn recorded_submits(&self) -> Vec<RecordedSubmit> {
        self.submits.read().await.clone()
    }

    /// Build a candidate bound to this adapter's kind.
    pub fn candidate(&self, id: &str, title: &str, author: &str) -> BookCandidate {
        BookCandidate {
            id: id.to_string(),
            source: self.kind,
            title: Some(title.to_string()),
            author: Some(author.to_string()),
            isbn: None,
            year: None,
            language: None,
            file_type: Some("epub".to_string()),
            size_bytes: Some(1024),
            release_name: Some(format!("{} - {} [epub]", title, author)),
            download_url: Some(format!("http://mock/dl/{}", id)),
        }
    }
}

#[async_trait]
impl SourceAdapter for MockSourceAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn search_by_identifier(&self, isbn: &str) -> Result<Vec<BookCandidate>, SourceError> {
        self.searches.write().await.push(RecordedSearch {
            query: isbn.to_string(),
            by_identifier: true,
        });

        if let Some(message) = self.search_error.read().await.clone() {
            return Err(SourceError::ApiError(message));
        }

        Ok(self.isbn_results.read().await.clone())
    }

    async fn search_by_text(
        &self,
        title: &str,
        author: Option<&str>,
    ) -> Result<Vec<BookCandidate>, SourceError> {
        let query = match author {
            Some(author) => format!("{} {}", title, author),
            None => title.to_string(),
        };
        self.searches.write().await.push(RecordedSearch {
            query,
            by_identifier: false,
        });

        if let Some(message) = self.search_error.read().await.clone() {
            return Err(SourceError::ApiError(message));
        }

        Ok(self.text_results.read().await.clone())
    }

    async fn submit(&self, candidate: &BookCandidate) -> Result<JobRef, SourceError> {
        self.submits.write().await.push(RecordedSubmit {
            candidate_id: candidate.id.clone(),
        });

        if let Some(message) = self.submit_error.read().await.clone() {
            return Err(SourceError::ApiError(message));
        }

        // The archive keys jobs by content hash, so reuse the candidate id.
        let job_id = candidate.id.clone();
        self.jobs.write().await.insert(
            job_id.clone(),
            JobStatus {
                state: JobState::Queued,
                file_path: None,
                file_size: None,
                error: None,
            },
        );

        Ok(JobRef { id: job_id })
    }

    async fn job_status(&self, job_id: &str) -> Result<JobStatus, SourceError> {
        self.jobs
            .read()
            .await
            .get(job_id)
            .cloned()
            .ok_or_else(|| SourceError::JobNotFound(job_id.to_string()))
    }

    async fn retry_job(&self, job_id: &str) -> Result<bool, SourceError> {
        let mut jobs = self.jobs.write().await;
        let Some(status) = jobs.get_mut(job_id) else {
            return Err(SourceError::JobNotFound(job_id.to_string()));
        };

        if !*self.retry_supported.read().await {
            return Ok(false);
        }

        status.state = JobState::Queued;
        status.error = None;
        Ok(true)
    }
}
