//! Orchestrator data types and errors.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::download::{DownloadError, DownloadRecord, SearchMethod};
use crate::matcher::ConfidenceTier;
use crate::request::RequestError;
use crate::source::{BookCandidate, SourceError, SourceKind};

/// Which source is tried first and whether falling back is permitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourcePriority {
    #[default]
    DirectFirst,
    IndexerFirst,
    DirectOnly,
    IndexerOnly,
}

impl SourcePriority {
    /// Sources to try, in order.
    pub fn order(&self) -> &'static [SourceKind] {
        match self {
            SourcePriority::DirectFirst => {
                &[SourceKind::DirectArchive, SourceKind::IndexerClient]
            }
            SourcePriority::IndexerFirst => {
                &[SourceKind::IndexerClient, SourceKind::DirectArchive]
            }
            SourcePriority::DirectOnly => &[SourceKind::DirectArchive],
            SourcePriority::IndexerOnly => &[SourceKind::IndexerClient],
        }
    }
}

/// A candidate with its confidence score against the request.
#[derive(Debug, Clone, Serialize)]
pub struct RankedCandidate {
    pub candidate: BookCandidate,
    pub score: u8,
    pub tier: ConfidenceTier,
    pub search_method: SearchMethod,
}

/// Caller overrides for a single initiation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DispatchOptions {
    /// Restrict the attempt to one source, skipping priority order.
    #[serde(default)]
    pub source: Option<SourceKind>,
    /// Dispatch this specific candidate regardless of tier.
    #[serde(default)]
    pub candidate_id: Option<String>,
}

/// What came of an initiation attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DownloadOutcome {
    /// A download was dispatched and is now in flight.
    Dispatched { download: DownloadRecord },
    /// Viable candidates exist but none cleared the auto-select bar.
    NeedsSelection { candidates: Vec<RankedCandidate> },
    /// Every source was exhausted; `failures` says what stopped each one.
    Failed {
        reason: String,
        failures: Vec<SourceFailure>,
    },
}

/// Why one source yielded nothing dispatchable.
#[derive(Debug, Clone, Serialize)]
pub struct SourceFailure {
    pub source: SourceKind,
    pub cause: FailureCause,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum FailureCause {
    /// Both searches came back empty.
    NoCandidates,
    /// Candidates existed but none cleared the confidence floor.
    BelowThreshold { best_score: u8, min_confidence: u8 },
    /// The daily cap blocked the attempt.
    RateLimited { current: i64, limit: i64 },
    SearchFailed { message: String },
    SubmitFailed { message: String },
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::NoCandidates => write!(f, "no candidates found"),
            FailureCause::BelowThreshold {
                best_score,
                min_confidence,
            } => write!(f, "best score {} below minimum {}", best_score, min_confidence),
            FailureCause::RateLimited { current, limit } => {
                write!(f, "daily limit reached ({}/{})", current, limit)
            }
            FailureCause::SearchFailed { message } => write!(f, "search failed: {}", message),
            FailureCause::SubmitFailed { message } => write!(f, "submit failed: {}", message),
        }
    }
}

/// One line per source, e.g.
/// `direct_archive: no candidates found; indexer_client: search failed: ...`.
pub fn describe_failures(failures: &[SourceFailure]) -> String {
    failures
        .iter()
        .map(|failure| format!("{}: {}", failure.source.as_str(), failure.cause))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors from orchestrator operations.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Request not found: {0}")]
    RequestNotFound(String),

    #[error("Download not found: {0}")]
    DownloadNotFound(String),

    #[error("Request {0} already has a download in flight")]
    DownloadInProgress(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Daily download limit reached ({current}/{limit})")]
    RateLimitExceeded { current: i64, limit: i64 },

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error(transparent)]
    RequestStore(#[from] RequestError),

    #[error(transparent)]
    DownloadStore(DownloadError),
}

impl From<DownloadError> for OrchestratorError {
    fn from(e: DownloadError) -> Self {
        match e {
            DownloadError::AlreadyInFlight(request_id) => {
                OrchestratorError::DownloadInProgress(request_id)
            }
            other => OrchestratorError::DownloadStore(other),
        }
    }
}
