//! Direct archive mirror adapter.
//!
//! The mirror exposes a small JSON API: search returns entries keyed by
//! content hash, requesting a hash starts a server-side fetch, and the status
//! endpoint reports transfer progress. The content hash doubles as the job
//! id, so status survives restarts without any adapter-side state.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::DirectArchiveConfig;

use super::traits::SourceAdapter;
use super::types::{BookCandidate, JobRef, JobState, JobStatus, SourceError, SourceKind};

pub struct DirectArchiveAdapter {
    client: Client,
    config: DirectArchiveConfig,
}

impl DirectArchiveAdapter {
    pub fn new(config: DirectArchiveConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    fn build_search_url(&self, params: &[(&str, &str)]) -> String {
        let mut url = format!("{}/api/search?", self.base_url());
        let mut first = true;

        if let Some(ref key) = self.config.api_key {
            url.push_str(&format!("apikey={}", urlencoding::encode(key)));
            first = false;
        }

        for (name, value) in params {
            if !first {
                url.push('&');
            }
            url.push_str(&format!("{}={}", name, urlencoding::encode(value)));
            first = false;
        }

        url
    }

    fn build_action_url(&self, action: &str, hash: &str) -> String {
        let mut url = format!(
            "{}/api/{}/{}",
            self.base_url(),
            action,
            urlencoding::encode(hash)
        );
        if let Some(ref key) = self.config.api_key {
            url.push_str(&format!("?apikey={}", urlencoding::encode(key)));
        }
        url
    }

    async fn search(&self, params: &[(&str, &str)]) -> Result<Vec<BookCandidate>, SourceError> {
        let url = self.build_search_url(params);
        debug!(source = self.name(), "Searching direct archive");

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

        let archive_response: ArchiveSearchResponse = response
            .json()
            .await
            .map_err(|e| SourceError::ApiError(format!("Failed to parse response: {}", e)))?;

        debug!(
            source = self.name(),
            results = archive_response.results.len(),
            "Direct archive search complete"
        );

        Ok(archive_response
            .results
            .into_iter()
            .map(|entry| BookCandidate {
                id: entry.hash,
                source: SourceKind::DirectArchive,
                title: entry.title,
                author: entry.author,
                isbn: entry.isbn,
                year: entry.year,
                language: entry.language,
                file_type: entry.extension,
                size_bytes: entry.size,
                release_name: None,
                download_url: None,
            })
            .collect())
    }
}

#[async_trait]
impl SourceAdapter for DirectArchiveAdapter {
    fn name(&self) -> &str {
        "direct_archive"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::DirectArchive
    }

    async fn search_by_identifier(&self, isbn: &str) -> Result<Vec<BookCandidate>, SourceError> {
        self.search(&[("isbn", isbn)]).await
    }

    async fn search_by_text(
        &self,
        title: &str,
        author: Option<&str>,
    ) -> Result<Vec<BookCandidate>, SourceError> {
        match author {
            Some(author) => self.search(&[("title", title), ("author", author)]).await,
            None => self.search(&[("title", title)]).await,
        }
    }

    async fn submit(&self, candidate: &BookCandidate) -> Result<JobRef, SourceError> {
        let url = self.build_action_url("download", &candidate.id);
        debug!(source = self.name(), hash = %candidate.id, "Requesting archive fetch");

        let response = self
            .client
            .post(&url)
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

        Ok(JobRef {
            id: candidate.id.clone(),
        })
    }

    async fn job_status(&self, job_id: &str) -> Result<JobStatus, SourceError> {
        let url = self.build_action_url("status", job_id);

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

        let status: ArchiveStatusResponse = response
            .json()
            .await
            .map_err(|e| SourceError::ApiError(format!("Failed to parse response: {}", e)))?;

        let state = match status.status.as_str() {
            "queued" => JobState::Queued,
            "downloading" => JobState::InProgress,
            "done" => JobState::Completed,
            other => {
                if status.error.is_none() && other != "error" {
                    debug!(source = self.name(), status = other, "Unknown archive status");
                }
                JobState::Failed
            }
        };

        Ok(JobStatus {
            state,
            file_path: status.path,
            file_size: status.size,
            error: status.error,
        })
    }

    async fn retry_job(&self, job_id: &str) -> Result<bool, SourceError> {
        // The mirror restarts a fetch when the hash is requested again.
        let url = self.build_action_url("download", job_id);

        let response = self
            .client
            .post(&url)
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

        Ok(true)
    }
}

// Archive API response types
#[derive(Debug, Deserialize)]
struct ArchiveSearchResponse {
    #[serde(default)]
    results: Vec<ArchiveEntry>,
}

#[derive(Debug, Deserialize)]
struct ArchiveEntry {
    hash: String,
    title: Option<String>,
    author: Option<String>,
    isbn: Option<String>,
    year: Option<i32>,
    language: Option<String>,
    extension: Option<String>,
    size: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ArchiveStatusResponse {
    status: String,
    path: Option<String>,
    size: Option<i64>,
    error: Option<String>,
}
