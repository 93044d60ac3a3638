//! Download orchestration.
//!
//! The orchestrator turns an approved book request into a download: it
//! searches the configured sources in priority order, scores candidates,
//! and either dispatches the winner or hands the shortlist back for manual
//! selection. The sweeper reconciles in-flight records against the sources.

mod engine;
mod sweeper;
mod types;

pub use engine::DownloadOrchestrator;
pub use sweeper::{ReconcileReport, ReconciliationSweeper};
pub use types::{
    describe_failures, DispatchOptions, DownloadOutcome, FailureCause, OrchestratorError,
    RankedCandidate, SourceFailure, SourcePriority,
};
