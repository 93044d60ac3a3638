//! Download records, persistence, and the daily rate limiter.
//!
//! A download record is the durable trace of one fulfillment attempt for a
//! request. At most one non-terminal record may exist per request at any
//! time; the store enforces that at creation.

mod rate_limiter;
mod sqlite_store;
mod store;
mod types;

pub use rate_limiter::{DailyLimitStatus, DailyRateLimiter};
pub use sqlite_store::SqliteDownloadStore;
pub use store::{CreateDownloadInput, DownloadError, DownloadStore};
pub use types::{DownloadRecord, DownloadStatus, SearchMethod, SourceRef};
