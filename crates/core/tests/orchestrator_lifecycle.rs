//! End-to-end orchestrator tests against mock sources and in-memory stores.

use std::sync::Arc;
use std::time::Duration;

use bookhound_core::config::OrchestratorSettings;
use bookhound_core::download::{
    DailyRateLimiter, DownloadStatus, DownloadStore, SearchMethod, SourceRef,
    SqliteDownloadStore,
};
use bookhound_core::orchestrator::{
    DispatchOptions, DownloadOrchestrator, DownloadOutcome, OrchestratorError,
    ReconciliationSweeper, SourcePriority,
};
use bookhound_core::request::{
    BookRequest, CreateRequestInput, RequestStatus, RequestStore, SqliteRequestStore,
};
use bookhound_core::source::{BookCandidate, JobState, SourceAdapter, SourceKind};
use bookhound_core::testing::MockSourceAdapter;

struct TestHarness {
    requests: Arc<dyn RequestStore>,
    downloads: Arc<dyn DownloadStore>,
    direct: Arc<MockSourceAdapter>,
    indexer: Arc<MockSourceAdapter>,
    limiter: DailyRateLimiter,
    settings: OrchestratorSettings,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_cap(25)
    }

    fn with_cap(cap: i64) -> Self {
        let requests: Arc<dyn RequestStore> = Arc::new(SqliteRequestStore::in_memory().unwrap());
        let downloads: Arc<dyn DownloadStore> =
            Arc::new(SqliteDownloadStore::in_memory().unwrap());
        let limiter = DailyRateLimiter::new(Arc::clone(&downloads), cap);

        Self {
            requests,
            downloads,
            direct: Arc::new(MockSourceAdapter::new(SourceKind::DirectArchive)),
            indexer: Arc::new(MockSourceAdapter::new(SourceKind::IndexerClient)),
            limiter,
            settings: OrchestratorSettings::default(),
        }
    }

    fn orchestrator(&self) -> DownloadOrchestrator {
        DownloadOrchestrator::new(
            self.settings.clone(),
            Arc::clone(&self.requests),
            Arc::clone(&self.downloads),
            Some(self.direct.clone() as Arc<dyn SourceAdapter>),
            Some(self.indexer.clone() as Arc<dyn SourceAdapter>),
            self.limiter.clone(),
        )
    }

    fn sweeper(&self) -> ReconciliationSweeper {
        ReconciliationSweeper::new(
            Arc::clone(&self.requests),
            Arc::clone(&self.downloads),
            Some(self.direct.clone() as Arc<dyn SourceAdapter>),
            Some(self.indexer.clone() as Arc<dyn SourceAdapter>),
            self.limiter.clone(),
            Duration::from_secs(30),
        )
    }

    fn create_request(&self) -> BookRequest {
        self.requests
            .create(CreateRequestInput {
                title: "Dune".to_string(),
                authors: vec!["Frank Herbert".to_string()],
                isbn13: Some("9780441013593".to_string()),
                year: Some(1965),
                language: Some("en".to_string()),
                ..Default::default()
            })
            .unwrap()
    }

    /// Candidate that scores High against [`create_request`] (ISBN + title +
    /// author match).
    fn high_candidate(&self, adapter: &MockSourceAdapter, id: &str) -> BookCandidate {
        let mut candidate = adapter.candidate(id, "Dune", "Frank Herbert");
        candidate.isbn = Some("9780441013593".to_string());
        candidate
    }

    /// Candidate that scores Medium (title + author + year + language, no
    /// ISBN).
    fn medium_candidate(&self, adapter: &MockSourceAdapter, id: &str) -> BookCandidate {
        let mut candidate = adapter.candidate(id, "Dune", "Frank Herbert");
        candidate.year = Some(1965);
        candidate.language = Some("en".to_string());
        candidate
    }

    fn request_status(&self, id: &str) -> RequestStatus {
        self.requests.get(id).unwrap().unwrap().status
    }
}

async fn wait_for_download_status(
    downloads: &Arc<dyn DownloadStore>,
    id: &str,
    status: DownloadStatus,
) {
    for _ in 0..200 {
        if downloads.get(id).unwrap().map(|r| r.status) == Some(status) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("download {} never reached {:?}", id, status);
}

fn dispatched(outcome: DownloadOutcome) -> bookhound_core::download::DownloadRecord {
    match outcome {
        DownloadOutcome::Dispatched { download } => download,
        other => panic!("expected dispatch, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_high_confidence_direct_download_completes() {
    let harness = TestHarness::new();
    let request = harness.create_request();

    let candidate = harness.high_candidate(&harness.direct, "hash-1");
    harness.direct.set_isbn_results(vec![candidate]).await;

    let orchestrator = harness.orchestrator();
    let outcome = orchestrator
        .initiate_download(&request.id, DispatchOptions::default())
        .await
        .unwrap();

    let record = dispatched(outcome);
    assert_eq!(record.status, DownloadStatus::Downloading);
    assert_eq!(record.search_method, SearchMethod::Isbn);
    assert_eq!(record.confidence, Some(90));
    assert!(matches!(record.source, SourceRef::DirectArchive { .. }));
    assert_eq!(harness.request_status(&request.id), RequestStatus::Approved);

    // The archive finishes the fetch; the detached monitor settles it.
    harness.direct.set_job_state("hash-1", JobState::Completed).await;
    wait_for_download_status(&harness.downloads, &record.id, DownloadStatus::Completed).await;

    let settled = harness.downloads.get(&record.id).unwrap().unwrap();
    assert!(settled.file_path.is_some());
    assert_eq!(harness.request_status(&request.id), RequestStatus::Completed);
    assert_eq!(harness.limiter.status().unwrap().current, 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_direct_transfer_flags_request() {
    let harness = TestHarness::new();
    let request = harness.create_request();

    let candidate = harness.high_candidate(&harness.direct, "hash-1");
    harness.direct.set_isbn_results(vec![candidate]).await;

    let orchestrator = harness.orchestrator();
    let record = dispatched(
        orchestrator
            .initiate_download(&request.id, DispatchOptions::default())
            .await
            .unwrap(),
    );

    harness.direct.set_job_state("hash-1", JobState::Failed).await;
    wait_for_download_status(&harness.downloads, &record.id, DownloadStatus::Failed).await;

    assert_eq!(
        harness.request_status(&request.id),
        RequestStatus::DownloadProblem
    );
    // Failed transfers never consume quota.
    assert_eq!(harness.limiter.status().unwrap().current, 0);
}

#[tokio::test]
async fn test_medium_confidence_needs_selection() {
    let harness = TestHarness::new();
    let request = harness.create_request();

    let candidate = harness.medium_candidate(&harness.direct, "hash-1");
    harness.direct.set_text_results(vec![candidate]).await;

    let outcome = harness
        .orchestrator()
        .initiate_download(&request.id, DispatchOptions::default())
        .await
        .unwrap();

    match outcome {
        DownloadOutcome::NeedsSelection { candidates } => {
            assert_eq!(candidates.len(), 1);
            assert_eq!(candidates[0].score, 50);
            assert_eq!(candidates[0].candidate.id, "hash-1");
        }
        other => panic!("expected selection, got {:?}", other),
    }

    // Nothing was dispatched.
    assert!(harness
        .downloads
        .active_for_request(&request.id)
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_auto_select_disabled_shortlists_high_candidates() {
    let mut harness = TestHarness::new();
    harness.settings.auto_select = false;
    let request = harness.create_request();

    let candidate = harness.high_candidate(&harness.direct, "hash-1");
    harness.direct.set_isbn_results(vec![candidate]).await;

    let outcome = harness
        .orchestrator()
        .initiate_download(&request.id, DispatchOptions::default())
        .await
        .unwrap();

    assert!(matches!(outcome, DownloadOutcome::NeedsSelection { .. }));
}

#[tokio::test]
async fn test_manual_candidate_selection_ignores_threshold() {
    let harness = TestHarness::new();
    let request = harness.create_request();

    // Scores 40 (title + author only), below the viability threshold.
    let candidate = harness.indexer.candidate("guid-1", "Dune", "Frank Herbert");
    harness.indexer.set_text_results(vec![candidate]).await;

    let record = dispatched(
        harness
            .orchestrator()
            .initiate_download(
                &request.id,
                DispatchOptions {
                    source: Some(SourceKind::IndexerClient),
                    candidate_id: Some("guid-1".to_string()),
                },
            )
            .await
            .unwrap(),
    );

    assert_eq!(record.search_method, SearchMethod::Manual);
    assert_eq!(record.confidence, Some(40));
    assert!(matches!(record.source, SourceRef::IndexerClient { .. }));
}

#[tokio::test]
async fn test_duplicate_initiation_rejected() {
    let harness = TestHarness::new();
    let request = harness.create_request();

    let candidate = harness.high_candidate(&harness.indexer, "guid-1");
    harness.indexer.set_isbn_results(vec![candidate]).await;

    let orchestrator = harness.orchestrator();
    dispatched(
        orchestrator
            .initiate_download(
                &request.id,
                DispatchOptions {
                    source: Some(SourceKind::IndexerClient),
                    candidate_id: None,
                },
            )
            .await
            .unwrap(),
    );

    let err = orchestrator
        .initiate_download(&request.id, DispatchOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::DownloadInProgress(_)));
}

#[tokio::test]
async fn test_falls_back_to_indexer_when_direct_search_fails() {
    let harness = TestHarness::new();
    let request = harness.create_request();

    harness.direct.fail_searches("archive is down").await;
    let candidate = harness.high_candidate(&harness.indexer, "guid-1");
    harness.indexer.set_isbn_results(vec![candidate]).await;

    let record = dispatched(
        harness
            .orchestrator()
            .initiate_download(&request.id, DispatchOptions::default())
            .await
            .unwrap(),
    );

    assert!(matches!(record.source, SourceRef::IndexerClient { .. }));
    assert_eq!(harness.indexer.recorded_submits().await.len(), 1);
}

#[tokio::test]
async fn test_falls_back_to_indexer_when_direct_submit_rejected() {
    let harness = TestHarness::new();
    let request = harness.create_request();

    harness.direct.fail_submits("archive rejected the request").await;
    harness
        .direct
        .set_isbn_results(vec![harness.high_candidate(&harness.direct, "hash-1")])
        .await;
    harness
        .indexer
        .set_isbn_results(vec![harness.high_candidate(&harness.indexer, "guid-1")])
        .await;

    let record = dispatched(
        harness
            .orchestrator()
            .initiate_download(&request.id, DispatchOptions::default())
            .await
            .unwrap(),
    );

    assert!(matches!(record.source, SourceRef::IndexerClient { .. }));
    assert_eq!(harness.request_status(&request.id), RequestStatus::Approved);

    // Both sources were actually asked, and only the indexer record is in
    // flight.
    assert_eq!(harness.direct.recorded_submits().await.len(), 1);
    assert_eq!(harness.indexer.recorded_submits().await.len(), 1);
    let active = harness
        .downloads
        .active_for_request(&request.id)
        .unwrap()
        .unwrap();
    assert_eq!(active.id, record.id);
}

#[tokio::test]
async fn test_direct_only_without_adapter_is_configuration_error() {
    let mut harness = TestHarness::new();
    harness.settings.priority = SourcePriority::DirectOnly;
    let request = harness.create_request();

    let orchestrator = DownloadOrchestrator::new(
        harness.settings.clone(),
        Arc::clone(&harness.requests),
        Arc::clone(&harness.downloads),
        None,
        Some(harness.indexer.clone() as Arc<dyn SourceAdapter>),
        harness.limiter.clone(),
    );

    let err = orchestrator
        .initiate_download(&request.id, DispatchOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::Configuration(_)));
    // The indexer must not be consulted in direct_only mode.
    assert!(harness.indexer.recorded_searches().await.is_empty());
}

#[tokio::test]
async fn test_rate_limited_direct_falls_back_to_indexer() {
    let harness = TestHarness::with_cap(1);
    let request = harness.create_request();

    harness.limiter.record_completion().unwrap();
    harness
        .direct
        .set_isbn_results(vec![harness.high_candidate(&harness.direct, "hash-1")])
        .await;
    harness
        .indexer
        .set_isbn_results(vec![harness.high_candidate(&harness.indexer, "guid-1")])
        .await;

    let record = dispatched(
        harness
            .orchestrator()
            .initiate_download(&request.id, DispatchOptions::default())
            .await
            .unwrap(),
    );

    assert!(matches!(record.source, SourceRef::IndexerClient { .. }));
    // The direct archive was skipped without being searched.
    assert!(harness.direct.recorded_searches().await.is_empty());
}

#[tokio::test]
async fn test_rate_limit_surfaces_when_no_source_remains() {
    let mut harness = TestHarness::with_cap(1);
    harness.settings.priority = SourcePriority::DirectOnly;
    let request = harness.create_request();

    harness.limiter.record_completion().unwrap();

    let err = harness
        .orchestrator()
        .initiate_download(&request.id, DispatchOptions::default())
        .await
        .unwrap_err();

    match err {
        OrchestratorError::RateLimitExceeded { current, limit } => {
            assert_eq!(current, 1);
            assert_eq!(limit, 1);
        }
        other => panic!("expected rate limit error, got {}", other),
    }
}

#[tokio::test]
async fn test_no_viable_candidates_flags_request() {
    let harness = TestHarness::new();
    let request = harness.create_request();

    let outcome = harness
        .orchestrator()
        .initiate_download(&request.id, DispatchOptions::default())
        .await
        .unwrap();

    let reason = match outcome {
        DownloadOutcome::Failed { reason, failures } => {
            assert_eq!(failures.len(), 2);
            reason
        }
        other => panic!("expected failure, got {:?}", other),
    };
    assert!(reason.contains("direct_archive"), "reason was {:?}", reason);
    assert!(reason.contains("indexer_client"), "reason was {:?}", reason);

    // Exhaustion flags the request and stores the reason on it.
    assert_eq!(
        harness.request_status(&request.id),
        RequestStatus::DownloadProblem
    );
    let stored = harness.requests.get(&request.id).unwrap().unwrap();
    assert_eq!(stored.error_message.as_deref(), Some(reason.as_str()));
}

#[tokio::test]
async fn test_exhaustion_reason_names_each_cause() {
    let harness = TestHarness::new();
    let request = harness.create_request();

    // Scores 40 (title + author only), below the minimum of 50.
    let candidate = harness.direct.candidate("hash-1", "Dune", "Frank Herbert");
    harness.direct.set_text_results(vec![candidate]).await;

    let outcome = harness
        .orchestrator()
        .initiate_download(&request.id, DispatchOptions::default())
        .await
        .unwrap();

    match outcome {
        DownloadOutcome::Failed { reason, .. } => {
            assert!(
                reason.contains("direct_archive: best score 40 below minimum 50"),
                "reason was {:?}",
                reason
            );
            assert!(
                reason.contains("indexer_client: no candidates found"),
                "reason was {:?}",
                reason
            );
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_search_errors_everywhere_flag_request() {
    let harness = TestHarness::new();
    let request = harness.create_request();

    harness.direct.fail_searches("archive is down").await;
    harness.indexer.fail_searches("indexer is down").await;

    let err = harness
        .orchestrator()
        .initiate_download(&request.id, DispatchOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestratorError::Source(_)));
    assert_eq!(
        harness.request_status(&request.id),
        RequestStatus::DownloadProblem
    );
}

#[tokio::test]
async fn test_isbn_search_runs_before_text_search() {
    let harness = TestHarness::new();
    let request = harness.create_request();

    harness
        .direct
        .set_text_results(vec![harness.medium_candidate(&harness.direct, "hash-1")])
        .await;

    harness
        .orchestrator()
        .initiate_download(&request.id, DispatchOptions::default())
        .await
        .unwrap();

    let searches = harness.direct.recorded_searches().await;
    assert!(searches.len() >= 2);
    assert!(searches[0].by_identifier);
    assert_eq!(searches[0].query, "9780441013593");
    assert!(!searches.last().unwrap().by_identifier);
}

#[tokio::test(start_paused = true)]
async fn test_high_isbn_match_skips_text_search() {
    let harness = TestHarness::new();
    let request = harness.create_request();

    harness
        .direct
        .set_isbn_results(vec![harness.high_candidate(&harness.direct, "hash-1")])
        .await;

    dispatched(
        harness
            .orchestrator()
            .initiate_download(&request.id, DispatchOptions::default())
            .await
            .unwrap(),
    );

    // The identifier hit was High tier, so the title search never ran.
    let searches = harness.direct.recorded_searches().await;
    assert_eq!(searches.len(), 1);
    assert!(searches[0].by_identifier);
}

#[tokio::test]
async fn test_low_isbn_match_still_runs_text_search() {
    let harness = TestHarness::new();
    let request = harness.create_request();

    // The identifier search only finds a weak match, so the text search
    // still gets to widen the pool.
    harness
        .direct
        .set_isbn_results(vec![harness
            .direct
            .candidate("hash-1", "Dune", "Frank Herbert")])
        .await;
    harness
        .direct
        .set_text_results(vec![harness.medium_candidate(&harness.direct, "hash-2")])
        .await;

    let outcome = harness
        .orchestrator()
        .initiate_download(&request.id, DispatchOptions::default())
        .await
        .unwrap();

    match outcome {
        DownloadOutcome::NeedsSelection { candidates } => {
            assert_eq!(candidates.len(), 1);
            assert_eq!(candidates[0].candidate.id, "hash-2");
        }
        other => panic!("expected selection, got {:?}", other),
    }

    let searches = harness.direct.recorded_searches().await;
    assert!(!searches.last().unwrap().by_identifier);
}

#[tokio::test]
async fn test_sweeper_settles_indexer_jobs() {
    let harness = TestHarness::new();
    let request = harness.create_request();

    harness
        .indexer
        .set_isbn_results(vec![harness.high_candidate(&harness.indexer, "guid-1")])
        .await;

    let record = dispatched(
        harness
            .orchestrator()
            .initiate_download(
                &request.id,
                DispatchOptions {
                    source: Some(SourceKind::IndexerClient),
                    candidate_id: None,
                },
            )
            .await
            .unwrap(),
    );
    assert_eq!(record.status, DownloadStatus::Downloading);

    // Nothing to settle yet.
    let report = harness.sweeper().reconcile().await;
    assert_eq!(report.checked, 1);
    assert_eq!(report.completed, 0);

    harness.indexer.set_job_state("guid-1", JobState::Completed).await;
    let report = harness.sweeper().reconcile().await;
    assert_eq!(report.completed, 1);

    let settled = harness.downloads.get(&record.id).unwrap().unwrap();
    assert_eq!(settled.status, DownloadStatus::Completed);
    assert_eq!(harness.request_status(&request.id), RequestStatus::Completed);
    // Indexer completions never count against the direct archive cap.
    assert_eq!(harness.limiter.status().unwrap().current, 0);
}

#[tokio::test]
async fn test_sweeper_isolates_records() {
    let harness = TestHarness::new();

    let first = harness.create_request();
    let second = harness.create_request();

    harness
        .indexer
        .set_isbn_results(vec![harness.high_candidate(&harness.indexer, "guid-1")])
        .await;

    let orchestrator = harness.orchestrator();
    let options = DispatchOptions {
        source: Some(SourceKind::IndexerClient),
        candidate_id: None,
    };
    let record_a = dispatched(
        orchestrator
            .initiate_download(&first.id, options.clone())
            .await
            .unwrap(),
    );

    harness
        .indexer
        .set_isbn_results(vec![harness.high_candidate(&harness.indexer, "guid-2")])
        .await;
    let record_b = dispatched(
        orchestrator
            .initiate_download(&second.id, options)
            .await
            .unwrap(),
    );

    // One job vanishes at the source, the other completes.
    harness.indexer.forget_job("guid-1").await;
    harness.indexer.set_job_state("guid-2", JobState::Completed).await;

    let report = harness.sweeper().reconcile().await;
    assert_eq!(report.checked, 2);
    assert_eq!(report.completed, 1);
    assert_eq!(report.failed, 1);

    assert_eq!(
        harness.downloads.get(&record_a.id).unwrap().unwrap().status,
        DownloadStatus::Failed
    );
    assert_eq!(
        harness.downloads.get(&record_b.id).unwrap().unwrap().status,
        DownloadStatus::Completed
    );
    assert_eq!(
        harness.request_status(&first.id),
        RequestStatus::DownloadProblem
    );
    assert_eq!(harness.request_status(&second.id), RequestStatus::Completed);
}

#[tokio::test]
async fn test_retry_failed_download() {
    let harness = TestHarness::new();
    let request = harness.create_request();

    harness
        .indexer
        .set_isbn_results(vec![harness.high_candidate(&harness.indexer, "guid-1")])
        .await;

    let orchestrator = harness.orchestrator();
    let record = dispatched(
        orchestrator
            .initiate_download(
                &request.id,
                DispatchOptions {
                    source: Some(SourceKind::IndexerClient),
                    candidate_id: None,
                },
            )
            .await
            .unwrap(),
    );

    // Retrying an in-flight download is invalid.
    let err = orchestrator.retry_download(&record.id).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::InvalidState(_)));

    harness.indexer.set_job_state("guid-1", JobState::Failed).await;
    harness.sweeper().reconcile().await;
    assert_eq!(
        harness.request_status(&request.id),
        RequestStatus::DownloadProblem
    );

    // The failed record itself goes back in flight; no second record.
    let fresh = orchestrator.retry_download(&record.id).await.unwrap();
    assert_eq!(fresh.id, record.id);
    assert_eq!(fresh.status, DownloadStatus::Downloading);
    assert!(fresh.error.is_none());
    assert_eq!(fresh.confidence, record.confidence);
    assert_eq!(harness.request_status(&request.id), RequestStatus::Approved);

    let active = harness
        .downloads
        .active_for_request(&request.id)
        .unwrap()
        .unwrap();
    assert_eq!(active.id, record.id);
}

#[tokio::test(start_paused = true)]
async fn test_direct_retry_reopens_record_as_pending() {
    let harness = TestHarness::new();
    let request = harness.create_request();

    harness
        .direct
        .set_isbn_results(vec![harness.high_candidate(&harness.direct, "hash-1")])
        .await;

    let orchestrator = harness.orchestrator();
    let record = dispatched(
        orchestrator
            .initiate_download(&request.id, DispatchOptions::default())
            .await
            .unwrap(),
    );

    harness.direct.set_job_state("hash-1", JobState::Failed).await;
    wait_for_download_status(&harness.downloads, &record.id, DownloadStatus::Failed).await;

    // Retry resets the same record to pending with the error cleared.
    let reopened = orchestrator.retry_download(&record.id).await.unwrap();
    assert_eq!(reopened.id, record.id);
    assert_eq!(reopened.status, DownloadStatus::Pending);
    assert!(reopened.error.is_none());
    assert_eq!(harness.request_status(&request.id), RequestStatus::Approved);

    // The re-triggered transfer finishes and the record completes again.
    harness.direct.set_job_state("hash-1", JobState::Completed).await;
    wait_for_download_status(&harness.downloads, &record.id, DownloadStatus::Completed).await;
    assert_eq!(harness.request_status(&request.id), RequestStatus::Completed);
}

#[tokio::test]
async fn test_retry_unsupported_requires_new_download() {
    let harness = TestHarness::new();
    let request = harness.create_request();

    harness
        .indexer
        .set_isbn_results(vec![harness.high_candidate(&harness.indexer, "guid-1")])
        .await;

    let orchestrator = harness.orchestrator();
    let record = dispatched(
        orchestrator
            .initiate_download(
                &request.id,
                DispatchOptions {
                    source: Some(SourceKind::IndexerClient),
                    candidate_id: None,
                },
            )
            .await
            .unwrap(),
    );

    harness.indexer.set_job_state("guid-1", JobState::Failed).await;
    harness.sweeper().reconcile().await;
    harness.indexer.set_retry_supported(false).await;

    let err = orchestrator.retry_download(&record.id).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::InvalidState(_)));

    // Rejection leaves the record exactly as it was.
    let unchanged = harness.downloads.get(&record.id).unwrap().unwrap();
    assert_eq!(unchanged.status, DownloadStatus::Failed);
    assert!(unchanged.error.is_some());
    assert!(harness
        .downloads
        .active_for_request(&request.id)
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_download_status_reports_latest_record() {
    let harness = TestHarness::new();
    let request = harness.create_request();

    let orchestrator = harness.orchestrator();
    assert!(orchestrator.download_status(&request.id).unwrap().is_none());

    let err = orchestrator.download_status("missing").unwrap_err();
    assert!(matches!(err, OrchestratorError::RequestNotFound(_)));

    harness
        .indexer
        .set_isbn_results(vec![harness.high_candidate(&harness.indexer, "guid-1")])
        .await;
    let record = dispatched(
        orchestrator
            .initiate_download(
                &request.id,
                DispatchOptions {
                    source: Some(SourceKind::IndexerClient),
                    candidate_id: None,
                },
            )
            .await
            .unwrap(),
    );

    let latest = orchestrator.download_status(&request.id).unwrap().unwrap();
    assert_eq!(latest.id, record.id);
}
