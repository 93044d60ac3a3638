//! Download record data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a download record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    /// Created but no transfer confirmed yet.
    Pending,
    /// Transfer is in flight at the source or download client.
    Downloading,
    Completed,
    Failed,
}

impl DownloadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadStatus::Pending => "pending",
            DownloadStatus::Downloading => "downloading",
            DownloadStatus::Completed => "completed",
            DownloadStatus::Failed => "failed",
        }
    }

    /// Terminal states never transition further.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DownloadStatus::Completed | DownloadStatus::Failed)
    }
}

/// Which external system a download record is bound to, with the handle
/// needed to find it again after a restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceRef {
    /// Direct HTTP archive; the hash identifies the content entry.
    DirectArchive { content_hash: String },
    /// Indexer release handed to the external download client.
    IndexerClient {
        job_id: String,
        release_name: String,
        indexer: String,
    },
}

impl SourceRef {
    pub fn kind_str(&self) -> &'static str {
        match self {
            SourceRef::DirectArchive { .. } => "direct_archive",
            SourceRef::IndexerClient { .. } => "indexer_client",
        }
    }
}

/// How the candidate behind this download was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMethod {
    Isbn,
    TitleAuthor,
    /// Operator picked the candidate by hand.
    Manual,
}

impl SearchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMethod::Isbn => "isbn",
            SearchMethod::TitleAuthor => "title_author",
            SearchMethod::Manual => "manual",
        }
    }
}

/// Durable record of one download attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadRecord {
    pub id: String,
    pub request_id: String,
    pub status: DownloadStatus,
    pub source: SourceRef,
    pub search_method: SearchMethod,
    /// Confidence score of the dispatched candidate, when one was scored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
