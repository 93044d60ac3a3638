//! The download orchestrator.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::OrchestratorSettings;
use crate::download::{
    CreateDownloadInput, DailyLimitStatus, DailyRateLimiter, DownloadError, DownloadRecord,
    DownloadStatus, DownloadStore, SearchMethod, SourceRef,
};
use crate::matcher::{calculate_confidence, ConfidenceTier};
use crate::request::{BookRequest, RequestStatus, RequestStore};
use crate::source::{BookCandidate, SourceAdapter, SourceError, SourceKind};

use super::types::{
    describe_failures, DispatchOptions, DownloadOutcome, FailureCause, OrchestratorError,
    RankedCandidate, SourceFailure, SourcePriority,
};

/// How often the detached transfer monitor polls the archive.
const MONITOR_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Consecutive poll errors before the monitor gives up and leaves the
/// record to the sweeper.
const MONITOR_MAX_POLL_ERRORS: u32 = 12;

/// Turns approved requests into downloads.
pub struct DownloadOrchestrator {
    settings: OrchestratorSettings,
    requests: Arc<dyn RequestStore>,
    downloads: Arc<dyn DownloadStore>,
    direct: Option<Arc<dyn SourceAdapter>>,
    indexer: Option<Arc<dyn SourceAdapter>>,
    limiter: DailyRateLimiter,
}

impl DownloadOrchestrator {
    pub fn new(
        settings: OrchestratorSettings,
        requests: Arc<dyn RequestStore>,
        downloads: Arc<dyn DownloadStore>,
        direct: Option<Arc<dyn SourceAdapter>>,
        indexer: Option<Arc<dyn SourceAdapter>>,
        limiter: DailyRateLimiter,
    ) -> Self {
        Self {
            settings,
            requests,
            downloads,
            direct,
            indexer,
            limiter,
        }
    }

    /// Search sources in priority order and dispatch (or shortlist)
    /// candidates for a request.
    pub async fn initiate_download(
        &self,
        request_id: &str,
        options: DispatchOptions,
    ) -> Result<DownloadOutcome, OrchestratorError> {
        let request = self
            .requests
            .get(request_id)?
            .ok_or_else(|| OrchestratorError::RequestNotFound(request_id.to_string()))?;

        if self.downloads.active_for_request(request_id)?.is_some() {
            return Err(OrchestratorError::DownloadInProgress(
                request_id.to_string(),
            ));
        }

        let order: Vec<SourceKind> = match options.source {
            Some(kind) => vec![kind],
            None => self.settings.priority.order().to_vec(),
        };

        let mut any_configured = false;
        let mut rate_limited: Option<DailyLimitStatus> = None;
        let mut last_error: Option<SourceError> = None;
        let mut failures: Vec<SourceFailure> = Vec::new();

        for kind in order {
            let Some(adapter) = self.adapter_for(kind) else {
                debug!(source = kind.as_str(), "Source not configured, skipping");
                continue;
            };
            any_configured = true;

            if kind == SourceKind::DirectArchive {
                let status = self.limiter.status()?;
                if !status.allowed {
                    info!(
                        current = status.current,
                        limit = status.limit,
                        "Daily limit reached, skipping direct archive"
                    );
                    failures.push(SourceFailure {
                        source: kind,
                        cause: FailureCause::RateLimited {
                            current: status.current,
                            limit: status.limit,
                        },
                    });
                    rate_limited = Some(status);
                    continue;
                }
            }

            let ranked = match self.search_and_rank(&adapter, &request).await {
                Ok(ranked) => ranked,
                Err(e) => {
                    warn!(source = kind.as_str(), error = %e, "Source search failed");
                    failures.push(SourceFailure {
                        source: kind,
                        cause: FailureCause::SearchFailed {
                            message: e.to_string(),
                        },
                    });
                    last_error = Some(e);
                    continue;
                }
            };

            if let Some(ref candidate_id) = options.candidate_id {
                let Some(mut chosen) = ranked.into_iter().find(|r| &r.candidate.id == candidate_id)
                else {
                    return Err(OrchestratorError::InvalidState(format!(
                        "candidate {} not found at {}",
                        candidate_id,
                        kind.as_str()
                    )));
                };
                // An explicit pick never falls through to another source.
                chosen.search_method = SearchMethod::Manual;
                let download = self.dispatch(&request, &adapter, chosen).await?;
                return Ok(DownloadOutcome::Dispatched { download });
            }

            if ranked.is_empty() {
                debug!(source = kind.as_str(), "Nothing found");
                failures.push(SourceFailure {
                    source: kind,
                    cause: FailureCause::NoCandidates,
                });
                continue;
            }

            let best_score = ranked[0].score;
            let mut viable: Vec<RankedCandidate> = ranked
                .into_iter()
                .filter(|r| r.score >= self.settings.min_confidence)
                .collect();

            if viable.is_empty() {
                debug!(source = kind.as_str(), best_score, "No viable candidates");
                failures.push(SourceFailure {
                    source: kind,
                    cause: FailureCause::BelowThreshold {
                        best_score,
                        min_confidence: self.settings.min_confidence,
                    },
                });
                continue;
            }

            if self.settings.auto_select && viable[0].tier == ConfidenceTier::High {
                let chosen = viable.remove(0);
                match self.dispatch(&request, &adapter, chosen).await {
                    Ok(download) => return Ok(DownloadOutcome::Dispatched { download }),
                    // A rejected submit fails this source only; the next
                    // one in the order still gets its turn.
                    Err(OrchestratorError::Source(e)) => {
                        warn!(source = kind.as_str(), error = %e, "Dispatch failed, trying next source");
                        failures.push(SourceFailure {
                            source: kind,
                            cause: FailureCause::SubmitFailed {
                                message: e.to_string(),
                            },
                        });
                        last_error = Some(e);
                        continue;
                    }
                    Err(other) => return Err(other),
                }
            }

            return Ok(DownloadOutcome::NeedsSelection { candidates: viable });
        }

        // Exhaustion: every path below flags the request with the reason.
        if !any_configured {
            let reason = "no configured source for the requested priority".to_string();
            self.flag_problem(&request.id, &reason);
            return Err(OrchestratorError::Configuration(reason));
        }

        let reason = describe_failures(&failures);
        self.flag_problem(&request.id, &reason);

        let only = |predicate: fn(&FailureCause) -> bool| {
            failures.iter().all(|failure| predicate(&failure.cause))
        };

        if only(|cause| matches!(cause, FailureCause::RateLimited { .. })) {
            if let Some(status) = rate_limited {
                return Err(OrchestratorError::RateLimitExceeded {
                    current: status.current,
                    limit: status.limit,
                });
            }
        }
        if only(|cause| {
            matches!(
                cause,
                FailureCause::SearchFailed { .. } | FailureCause::SubmitFailed { .. }
            )
        }) {
            if let Some(e) = last_error {
                return Err(OrchestratorError::Source(e));
            }
        }

        warn!(request_id = %request.id, reason = %reason, "Every source exhausted");
        Ok(DownloadOutcome::Failed { reason, failures })
    }

    /// Record why the request's downloads gave up. Losing the flag is not
    /// worth failing the whole operation over.
    fn flag_problem(&self, request_id: &str, reason: &str) {
        if let Err(e) = self.requests.mark_problem(request_id, reason) {
            warn!(request_id = %request_id, error = %e, "Failed to flag request");
        }
    }

    /// Retry a failed download in place at its source.
    pub async fn retry_download(
        &self,
        download_id: &str,
    ) -> Result<DownloadRecord, OrchestratorError> {
        let record = self
            .downloads
            .get(download_id)?
            .ok_or_else(|| OrchestratorError::DownloadNotFound(download_id.to_string()))?;

        if record.status != DownloadStatus::Failed {
            return Err(OrchestratorError::InvalidState(format!(
                "download {} is {}, only failed downloads can be retried",
                download_id,
                record.status.as_str()
            )));
        }

        let kind = match record.source {
            SourceRef::DirectArchive { .. } => SourceKind::DirectArchive,
            SourceRef::IndexerClient { .. } => SourceKind::IndexerClient,
        };
        let adapter = self.adapter_for(kind).ok_or_else(|| {
            OrchestratorError::Configuration(format!(
                "source {} is no longer configured",
                kind.as_str()
            ))
        })?;

        if kind == SourceKind::DirectArchive {
            let status = self.limiter.status()?;
            if !status.allowed {
                return Err(OrchestratorError::RateLimitExceeded {
                    current: status.current,
                    limit: status.limit,
                });
            }
        }

        let job_id = job_id_of(&record.source).to_string();
        let retried = adapter.retry_job(&job_id).await?;
        if !retried {
            // Rejection leaves the record untouched.
            return Err(OrchestratorError::InvalidState(format!(
                "source dropped job {}, start a new download instead",
                job_id
            )));
        }

        // The failed record itself goes back in flight; a retry never
        // grows a second record for the request. The archive re-fetch
        // starts over from pending, an accepted indexer retry is already
        // transferring.
        let restart = match kind {
            SourceKind::DirectArchive => DownloadStatus::Pending,
            SourceKind::IndexerClient => DownloadStatus::Downloading,
        };
        let reopened = self.downloads.reopen(&record.id, restart)?;

        if let Err(e) = self
            .requests
            .update_status(&record.request_id, RequestStatus::Approved)
        {
            warn!(request_id = %record.request_id, error = %e, "Failed to reset request status");
        }

        if kind == SourceKind::DirectArchive {
            self.spawn_transfer_monitor(reopened.id.clone(), job_id, adapter);
        }

        info!(download_id = %reopened.id, "Retried failed download");
        Ok(reopened)
    }

    /// The most recent download record for a request.
    pub fn download_status(
        &self,
        request_id: &str,
    ) -> Result<Option<DownloadRecord>, OrchestratorError> {
        self.requests
            .get(request_id)?
            .ok_or_else(|| OrchestratorError::RequestNotFound(request_id.to_string()))?;
        Ok(self.downloads.latest_for_request(request_id)?)
    }

    /// Today's usage against the direct archive cap.
    pub fn daily_limit(&self) -> Result<DailyLimitStatus, OrchestratorError> {
        Ok(self.limiter.status()?)
    }

    fn adapter_for(&self, kind: SourceKind) -> Option<Arc<dyn SourceAdapter>> {
        match kind {
            SourceKind::DirectArchive => self.direct.clone(),
            SourceKind::IndexerClient => self.indexer.clone(),
        }
    }

    /// ISBN lookup first; the title/author search only runs when the
    /// identifier pass found no High-tier match. ISBN search failures
    /// degrade to the text search instead of aborting.
    async fn search_and_rank(
        &self,
        adapter: &Arc<dyn SourceAdapter>,
        request: &BookRequest,
    ) -> Result<Vec<RankedCandidate>, SourceError> {
        let rank = |candidate: BookCandidate, search_method: SearchMethod| {
            let result = calculate_confidence(&candidate, request);
            RankedCandidate {
                candidate,
                score: result.score,
                tier: result.tier,
                search_method,
            }
        };

        let mut ranked: Vec<RankedCandidate> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for isbn in [request.isbn13.as_deref(), request.isbn10.as_deref()]
            .into_iter()
            .flatten()
        {
            match adapter.search_by_identifier(isbn).await {
                Ok(candidates) => {
                    if candidates.is_empty() {
                        continue;
                    }
                    for candidate in candidates {
                        if seen.insert(candidate.id.clone()) {
                            ranked.push(rank(candidate, SearchMethod::Isbn));
                        }
                    }
                    break;
                }
                Err(e) => {
                    warn!(source = adapter.name(), error = %e, "ISBN search failed");
                }
            }
        }

        let have_high_match = ranked.iter().any(|r| r.tier == ConfidenceTier::High);
        if !have_high_match {
            let author = request.authors.first().map(String::as_str);
            match adapter.search_by_text(&request.title, author).await {
                Ok(candidates) => {
                    for candidate in candidates {
                        if seen.insert(candidate.id.clone()) {
                            ranked.push(rank(candidate, SearchMethod::TitleAuthor));
                        }
                    }
                }
                Err(e) => {
                    if ranked.is_empty() {
                        return Err(e);
                    }
                    warn!(source = adapter.name(), error = %e, "Text search failed");
                }
            }
        }

        ranked.sort_by(|a, b| b.score.cmp(&a.score));

        debug!(
            source = adapter.name(),
            candidates = ranked.len(),
            top_score = ranked.first().map(|r| r.score).unwrap_or(0),
            "Search and rank complete"
        );

        Ok(ranked)
    }

    /// Create the record and hand the candidate to its source.
    async fn dispatch(
        &self,
        request: &BookRequest,
        adapter: &Arc<dyn SourceAdapter>,
        chosen: RankedCandidate,
    ) -> Result<DownloadRecord, OrchestratorError> {
        let record = match adapter.kind() {
            SourceKind::DirectArchive => {
                self.dispatch_direct(request, adapter, &chosen).await?
            }
            SourceKind::IndexerClient => {
                self.dispatch_indexer(request, adapter, &chosen).await?
            }
        };

        if request.status == RequestStatus::Pending
            || request.status == RequestStatus::DownloadProblem
        {
            if let Err(e) = self
                .requests
                .update_status(&request.id, RequestStatus::Approved)
            {
                warn!(request_id = %request.id, error = %e, "Failed to update request status");
            }
        }

        info!(
            request_id = %request.id,
            download_id = %record.id,
            source = record.source.kind_str(),
            score = chosen.score,
            "Dispatched download"
        );

        Ok(record)
    }

    /// Direct archive: the record holds the slot first, then the fetch is
    /// requested and a detached monitor polls it to a terminal state.
    async fn dispatch_direct(
        &self,
        request: &BookRequest,
        adapter: &Arc<dyn SourceAdapter>,
        chosen: &RankedCandidate,
    ) -> Result<DownloadRecord, OrchestratorError> {
        let record = self.downloads.create(CreateDownloadInput {
            request_id: request.id.clone(),
            source: SourceRef::DirectArchive {
                content_hash: chosen.candidate.id.clone(),
            },
            search_method: chosen.search_method,
            confidence: Some(chosen.score),
        })?;

        if let Err(e) = adapter.submit(&chosen.candidate).await {
            let _ = self.downloads.mark_failed(&record.id, &e.to_string());
            return Err(e.into());
        }

        let record = self.downloads.mark_downloading(&record.id)?;
        self.spawn_transfer_monitor(record.id.clone(), chosen.candidate.id.clone(), adapter.clone());
        Ok(record)
    }

    /// Indexer: submission is synchronous and the sweeper reconciles the
    /// job later, so there is no detached monitor.
    async fn dispatch_indexer(
        &self,
        request: &BookRequest,
        adapter: &Arc<dyn SourceAdapter>,
        chosen: &RankedCandidate,
    ) -> Result<DownloadRecord, OrchestratorError> {
        let job = adapter.submit(&chosen.candidate).await?;

        let release_name = chosen
            .candidate
            .release_name
            .clone()
            .unwrap_or_else(|| chosen.candidate.id.clone());

        let record = self.downloads.create(CreateDownloadInput {
            request_id: request.id.clone(),
            source: SourceRef::IndexerClient {
                job_id: job.id,
                release_name,
                indexer: adapter.name().to_string(),
            },
            search_method: chosen.search_method,
            confidence: Some(chosen.score),
        })?;

        Ok(self.downloads.mark_downloading(&record.id)?)
    }

    fn spawn_transfer_monitor(
        &self,
        download_id: String,
        job_id: String,
        adapter: Arc<dyn SourceAdapter>,
    ) {
        let downloads = Arc::clone(&self.downloads);
        let requests = Arc::clone(&self.requests);
        let limiter = self.limiter.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(MONITOR_POLL_INTERVAL);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut poll_errors = 0u32;
            let mut marked_downloading = false;

            loop {
                interval.tick().await;

                match adapter.job_status(&job_id).await {
                    Ok(status) => {
                        poll_errors = 0;
                        match status.state {
                            crate::source::JobState::Completed => {
                                settle_completed(
                                    &downloads,
                                    &requests,
                                    Some(&limiter),
                                    &download_id,
                                    status.file_path.as_deref(),
                                    status.file_size,
                                );
                                break;
                            }
                            crate::source::JobState::Failed => {
                                let reason = status
                                    .error
                                    .unwrap_or_else(|| "transfer failed".to_string());
                                settle_failed(&downloads, &requests, &download_id, &reason);
                                break;
                            }
                            crate::source::JobState::InProgress => {
                                // A reopened record rejoins `downloading`
                                // once the source reports progress.
                                if !marked_downloading {
                                    marked_downloading =
                                        downloads.mark_downloading(&download_id).is_ok();
                                }
                            }
                            crate::source::JobState::Queued => {}
                        }
                    }
                    Err(SourceError::JobNotFound(_)) => {
                        settle_failed(
                            &downloads,
                            &requests,
                            &download_id,
                            "source no longer knows the job",
                        );
                        break;
                    }
                    Err(e) => {
                        poll_errors += 1;
                        warn!(download_id = %download_id, error = %e, "Transfer poll failed");
                        if poll_errors >= MONITOR_MAX_POLL_ERRORS {
                            // Leave the record in flight; the sweeper owns it now.
                            warn!(download_id = %download_id, "Monitor giving up after repeated poll failures");
                            break;
                        }
                    }
                }
            }
        });
    }
}

/// The source-side job handle recorded on a download.
pub(super) fn job_id_of(source: &SourceRef) -> &str {
    match source {
        SourceRef::DirectArchive { content_hash } => content_hash,
        SourceRef::IndexerClient { job_id, .. } => job_id,
    }
}

/// Settle a download as completed: mark the record, count it against the
/// daily quota when a limiter applies, and complete the request. Safe to
/// call from racing pollers; the first transition wins.
pub(super) fn settle_completed(
    downloads: &Arc<dyn DownloadStore>,
    requests: &Arc<dyn RequestStore>,
    limiter: Option<&DailyRateLimiter>,
    download_id: &str,
    file_path: Option<&str>,
    file_size: Option<i64>,
) {
    let record = match downloads.mark_completed(download_id, file_path, file_size) {
        Ok(record) => record,
        Err(DownloadError::AlreadyTerminal(_)) => return,
        Err(e) => {
            warn!(download_id = %download_id, error = %e, "Failed to mark download completed");
            return;
        }
    };

    if let Some(limiter) = limiter {
        if let Err(e) = limiter.record_completion() {
            warn!(download_id = %download_id, error = %e, "Failed to record daily usage");
        }
    }

    if let Err(e) = requests.update_status(&record.request_id, RequestStatus::Completed) {
        warn!(request_id = %record.request_id, error = %e, "Failed to complete request");
    }

    info!(download_id = %download_id, "Download completed");
}

/// Settle a download as failed and flag the request.
pub(super) fn settle_failed(
    downloads: &Arc<dyn DownloadStore>,
    requests: &Arc<dyn RequestStore>,
    download_id: &str,
    reason: &str,
) {
    let record = match downloads.mark_failed(download_id, reason) {
        Ok(record) => record,
        Err(DownloadError::AlreadyTerminal(_)) => return,
        Err(e) => {
            warn!(download_id = %download_id, error = %e, "Failed to mark download failed");
            return;
        }
    };

    if let Err(e) = requests.mark_problem(&record.request_id, reason) {
        warn!(request_id = %record.request_id, error = %e, "Failed to flag request");
    }

    warn!(download_id = %download_id, reason = reason, "Download failed");
}
