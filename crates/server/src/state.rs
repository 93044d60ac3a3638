use std::sync::Arc;

use bookhound_core::config::{Config, SanitizedConfig};
use bookhound_core::orchestrator::{DownloadOrchestrator, ReconciliationSweeper};
use bookhound_core::request::RequestStore;

/// Shared application state
pub struct AppState {
    config: Config,
    requests: Arc<dyn RequestStore>,
    orchestrator: Arc<DownloadOrchestrator>,
    sweeper: Arc<ReconciliationSweeper>,
}

impl AppState {
    pub fn new(
        config: Config,
        requests: Arc<dyn RequestStore>,
        orchestrator: Arc<DownloadOrchestrator>,
        sweeper: Arc<ReconciliationSweeper>,
    ) -> Self {
        Self {
            config,
            requests,
            orchestrator,
            sweeper,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn requests(&self) -> &dyn RequestStore {
        self.requests.as_ref()
    }

    pub fn orchestrator(&self) -> &DownloadOrchestrator {
        &self.orchestrator
    }

    pub fn sweeper(&self) -> &ReconciliationSweeper {
        &self.sweeper
    }
}
