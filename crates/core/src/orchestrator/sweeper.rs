//! Reconciliation sweeper.
//!
//! In-flight download records can outlive the task that was watching them
//! (process restart, monitor giving up, indexer jobs that are only ever
//! polled here). The sweeper periodically walks every non-terminal record,
//! asks its source what actually happened, and settles the ones that
//! finished. One record failing to reconcile never blocks the rest.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::download::{DailyRateLimiter, DownloadRecord, DownloadStore, SourceRef};
use crate::request::RequestStore;
use crate::source::{JobState, SourceAdapter, SourceError, SourceKind};

use super::engine::{job_id_of, settle_completed, settle_failed};

/// What one sweep did.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ReconcileReport {
    pub checked: usize,
    pub completed: usize,
    pub failed: usize,
    /// Records that could not be reconciled this sweep.
    pub errors: usize,
}

pub struct ReconciliationSweeper {
    requests: Arc<dyn RequestStore>,
    downloads: Arc<dyn DownloadStore>,
    direct: Option<Arc<dyn SourceAdapter>>,
    indexer: Option<Arc<dyn SourceAdapter>>,
    limiter: DailyRateLimiter,
    interval: Duration,
}

impl ReconciliationSweeper {
    pub fn new(
        requests: Arc<dyn RequestStore>,
        downloads: Arc<dyn DownloadStore>,
        direct: Option<Arc<dyn SourceAdapter>>,
        indexer: Option<Arc<dyn SourceAdapter>>,
        limiter: DailyRateLimiter,
        interval: Duration,
    ) -> Self {
        Self {
            requests,
            downloads,
            direct,
            indexer,
            limiter,
            interval,
        }
    }

    /// Reconcile every in-flight record once.
    pub async fn reconcile(&self) -> ReconcileReport {
        let records = match self.downloads.list_in_flight() {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Sweep could not list in-flight downloads");
                return ReconcileReport::default();
            }
        };

        let mut report = ReconcileReport {
            checked: records.len(),
            ..Default::default()
        };

        for record in records {
            match self.reconcile_one(&record).await {
                Ok(Some(JobState::Completed)) => report.completed += 1,
                Ok(Some(JobState::Failed)) => report.failed += 1,
                Ok(_) => {}
                Err(e) => {
                    report.errors += 1;
                    warn!(download_id = %record.id, error = %e, "Failed to reconcile download");
                }
            }
        }

        if report.completed > 0 || report.failed > 0 {
            info!(
                checked = report.checked,
                completed = report.completed,
                failed = report.failed,
                errors = report.errors,
                "Sweep settled downloads"
            );
        } else {
            debug!(checked = report.checked, "Sweep complete");
        }

        report
    }

    /// Poll one record's source. Returns the terminal state it settled to,
    /// if any.
    async fn reconcile_one(
        &self,
        record: &DownloadRecord,
    ) -> Result<Option<JobState>, SourceError> {
        let (kind, limiter) = match record.source {
            SourceRef::DirectArchive { .. } => {
                (SourceKind::DirectArchive, Some(&self.limiter))
            }
            SourceRef::IndexerClient { .. } => (SourceKind::IndexerClient, None),
        };

        let adapter = match kind {
            SourceKind::DirectArchive => self.direct.as_ref(),
            SourceKind::IndexerClient => self.indexer.as_ref(),
        };
        let Some(adapter) = adapter else {
            // Source was removed from the config; the record can never
            // finish, so fail it rather than sweep it forever.
            settle_failed(
                &self.downloads,
                &self.requests,
                &record.id,
                "source is no longer configured",
            );
            return Ok(Some(JobState::Failed));
        };

        let job_id = job_id_of(&record.source);
        let status = match adapter.job_status(job_id).await {
            Ok(status) => status,
            Err(SourceError::JobNotFound(_)) => {
                settle_failed(
                    &self.downloads,
                    &self.requests,
                    &record.id,
                    "source no longer knows the job",
                );
                return Ok(Some(JobState::Failed));
            }
            Err(e) => return Err(e),
        };

        match status.state {
            JobState::Completed => {
                settle_completed(
                    &self.downloads,
                    &self.requests,
                    limiter,
                    &record.id,
                    status.file_path.as_deref(),
                    status.file_size,
                );
                Ok(Some(JobState::Completed))
            }
            JobState::Failed => {
                let reason = status
                    .error
                    .unwrap_or_else(|| "transfer failed".to_string());
                settle_failed(&self.downloads, &self.requests, &record.id, &reason);
                Ok(Some(JobState::Failed))
            }
            JobState::Queued | JobState::InProgress => Ok(None),
        }
    }

    /// Run sweeps on an interval until shutdown.
    pub fn spawn(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) {
        let interval = self.interval;

        tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "Reconciliation sweeper started");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick fires immediately; skip it so startup is quiet.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Reconciliation sweeper received shutdown signal");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.reconcile().await;
                    }
                }
            }
        });
    }
}
