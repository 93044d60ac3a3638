//! Daily download rate limiting backed by the durable counter.
//!
//! The counter lives in the download store so the limit survives restarts.
//! Days roll over at UTC midnight. Only completed transfers count against
//! the cap, so a failed attempt does not consume quota.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use super::store::{DownloadError, DownloadStore};

/// Snapshot of today's usage against the configured cap.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DailyLimitStatus {
    pub allowed: bool,
    pub current: i64,
    pub limit: i64,
}

/// Checks and records daily download usage for the rate-limited source.
#[derive(Clone)]
pub struct DailyRateLimiter {
    downloads: Arc<dyn DownloadStore>,
    cap: i64,
}

impl DailyRateLimiter {
    /// A cap of 0 disables the limit.
    pub fn new(downloads: Arc<dyn DownloadStore>, cap: i64) -> Self {
        Self { downloads, cap }
    }

    /// Usage for the current UTC day.
    pub fn status(&self) -> Result<DailyLimitStatus, DownloadError> {
        let current = self.downloads.daily_count(&today())?;
        Ok(DailyLimitStatus {
            allowed: self.cap == 0 || current < self.cap,
            current,
            limit: self.cap,
        })
    }

    /// Record one completed transfer against today's quota.
    pub fn record_completion(&self) -> Result<i64, DownloadError> {
        self.downloads.increment_daily_count(&today())
    }
}

fn today() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}
