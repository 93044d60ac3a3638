//! Indexer + download client adapter.
//!
//! Searches go to a Torznab-style indexer which returns release names;
//! submissions hand the release's link to an external download client that
//! owns the actual transfer. The client's job id is the handle the sweeper
//! polls later.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::{DownloadClientConfig, IndexerConfig};
use crate::matcher::parse_release_name;

use super::traits::SourceAdapter;
use super::types::{BookCandidate, JobRef, JobState, JobStatus, SourceError, SourceKind};

/// Torznab category for books.
const BOOKS_CATEGORY: i32 = 7000;

pub struct IndexerClientAdapter {
    client: Client,
    indexer: IndexerConfig,
    downloader: DownloadClientConfig,
}

impl IndexerClientAdapter {
    pub fn new(indexer: IndexerConfig, downloader: DownloadClientConfig) -> Self {
        let timeout = indexer.timeout_secs.max(downloader.timeout_secs);
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout as u64))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            indexer,
            downloader,
        }
    }

    /// Build the indexer API URL for a query string.
    fn build_search_url(&self, query: &str) -> String {
        format!(
            "{}/api/v2.0/indexers/all/results?apikey={}&Query={}&Category[]={}",
            self.indexer.url.trim_end_matches('/'),
            urlencoding::encode(&self.indexer.api_key),
            urlencoding::encode(query),
            BOOKS_CATEGORY
        )
    }

    fn build_job_url(&self, path: &str) -> String {
        let mut url = format!(
            "{}/api/v2/jobs{}",
            self.downloader.url.trim_end_matches('/'),
            path
        );
        if let Some(ref key) = self.downloader.api_key {
            url.push_str(&format!("?apikey={}", urlencoding::encode(key)));
        }
        url
    }

    async fn search(&self, query: &str) -> Result<Vec<BookCandidate>, SourceError> {
        let url = self.build_search_url(query);
        debug!(indexer = %self.indexer.name, query = query, "Searching indexer");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(SourceError::from_reqwest)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::ApiError(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let indexer_response: IndexerResponse = response
            .json()
            .await
            .map_err(|e| SourceError::ApiError(format!("Failed to parse response: {}", e)))?;

        debug!(
            indexer = %self.indexer.name,
            results = indexer_response.Results.len(),
            "Indexer search complete"
        );

        Ok(indexer_response
            .Results
            .into_iter()
            .map(release_to_candidate)
            .collect())
    }
}

/// Turn one indexer release into a candidate, recovering metadata from the
/// release name.
fn release_to_candidate(release: IndexerResult) -> BookCandidate {
    let parsed = parse_release_name(&release.Title);

    BookCandidate {
        id: release
            .Guid
            .unwrap_or_else(|| release.Title.clone()),
        source: SourceKind::IndexerClient,
        title: parsed.title,
        author: parsed.author,
        isbn: None,
        year: parsed.year,
        language: parsed.language,
        file_type: detect_file_type(&release.Title),
        size_bytes: release.Size,
        release_name: Some(release.Title),
        download_url: release.MagnetUri.or(release.Link),
    }
}

/// Pull a known ebook extension out of a release name, if present.
fn detect_file_type(release_name: &str) -> Option<String> {
    let lowered = release_name.to_lowercase();
    ["epub", "mobi", "azw3", "pdf", "cbz", "cbr"]
        .into_iter()
        .find(|ext| lowered.contains(ext))
        .map(str::to_string)
}

#[async_trait]
impl SourceAdapter for IndexerClientAdapter {
    fn name(&self) -> &str {
        &self.indexer.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::IndexerClient
    }

    async fn search_by_identifier(&self, isbn: &str) -> Result<Vec<BookCandidate>, SourceError> {
        self.search(isbn).await
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
        self.search(&query).await
    }

    async fn submit(&self, candidate: &BookCandidate) -> Result<JobRef, SourceError> {
        let Some(ref download_url) = candidate.download_url else {
            return Err(SourceError::InvalidCandidate(format!(
                "candidate {} has no download link",
                candidate.id
            )));
        };

        let url = self.build_job_url("");
        let body = json!({
            "url": download_url,
            "name": candidate.release_name.as_deref().unwrap_or(&candidate.id),
            "category": self.downloader.category,
        });

        debug!(candidate = %candidate.id, "Submitting to download client");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(SourceError::from_reqwest)?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(SourceError::ApiError(format!(
                "HTTP {}: {}",
                status,
                text.chars().take(200).collect::<String>()
            )));
        }

        let job: ClientJobCreated = response
            .json()
            .await
            .map_err(|e| SourceError::ApiError(format!("Failed to parse response: {}", e)))?;

        Ok(JobRef { id: job.id })
    }

    async fn job_status(&self, job_id: &str) -> Result<JobStatus, SourceError> {
        let url = self.build_job_url(&format!("/{}", urlencoding::encode(job_id)));

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(SourceError::from_reqwest)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(SourceError::JobNotFound(job_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(SourceError::ApiError(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let job: ClientJobStatus = response
            .json()
            .await
            .map_err(|e| SourceError::ApiError(format!("Failed to parse response: {}", e)))?;

        let state = match job.state.as_str() {
            "queued" => JobState::Queued,
            "downloading" => JobState::InProgress,
            "completed" => JobState::Completed,
            _ => JobState::Failed,
        };

        Ok(JobStatus {
            state,
            file_path: job.path,
            file_size: job.size,
            error: job.error,
        })
    }

    async fn retry_job(&self, job_id: &str) -> Result<bool, SourceError> {
        let url = self.build_job_url(&format!("/{}/retry", urlencoding::encode(job_id)));

        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(SourceError::from_reqwest)?;

        match response.status() {
            reqwest::StatusCode::NOT_FOUND => Err(SourceError::JobNotFound(job_id.to_string())),
            // 409 means the client dropped the job; the caller must resubmit.
            reqwest::StatusCode::CONFLICT => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(SourceError::ApiError(format!("HTTP {}", status))),
        }
    }
}

// Indexer API response types
#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct IndexerResponse {
    Results: Vec<IndexerResult>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct IndexerResult {
    Title: String,
    Guid: Option<String>,
    MagnetUri: Option<String>,
    Link: Option<String>,
    Size: Option<i64>,
}

// Download client API response types
#[derive(Debug, Deserialize)]
struct ClientJobCreated {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ClientJobStatus {
    state: String,
    path: Option<String>,
    size: Option<i64>,
    error: Option<String>,
}
