//! Book request model and storage.
//!
//! Requests are owned by the external approval workflow; this core reads
//! their metadata for matching and writes status transitions tied to
//! download outcomes.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteRequestStore;
pub use store::{CreateRequestInput, RequestError, RequestFilter, RequestStore};
pub use types::{BookRequest, RequestStatus};
