//! Book source adapters.
//!
//! Each adapter wraps one external acquisition system behind the
//! [`SourceAdapter`] trait so the orchestrator can search, submit, and poll
//! without knowing which system sits behind it.

mod direct_archive;
mod indexer_client;
mod traits;
mod types;

pub use direct_archive::DirectArchiveAdapter;
pub use indexer_client::IndexerClientAdapter;
pub use traits::SourceAdapter;
pub use types::{BookCandidate, JobRef, JobState, JobStatus, SourceError, SourceKind};
