use crate::orchestrator::SourcePriority;

use super::{types::Config, ConfigError};

/// Validate configuration
///
/// Checks the parts serde cannot: port range, confidence bounds, and that
/// the configured source priority has the sources it needs.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.orchestrator.min_confidence > 100 {
        return Err(ConfigError::ValidationError(
            "orchestrator.min_confidence must be between 0 and 100".to_string(),
        ));
    }

    if config.orchestrator.sweep_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.sweep_interval_secs cannot be 0".to_string(),
        ));
    }

    // The indexer source needs both the indexer and the download client.
    if config.sources.indexer.is_some() && config.sources.download_client.is_none() {
        return Err(ConfigError::ValidationError(
            "sources.indexer requires sources.download_client".to_string(),
        ));
    }

    // Single-source modes with the source missing are a misconfiguration the
    // operator should hear about at boot, not at the first download attempt.
    match config.orchestrator.priority {
        SourcePriority::DirectOnly if config.sources.direct_archive.is_none() => {
            return Err(ConfigError::ValidationError(
                "priority is direct_only but sources.direct_archive is not configured".to_string(),
            ));
        }
        SourcePriority::IndexerOnly if config.sources.indexer.is_none() => {
            return Err(ConfigError::ValidationError(
                "priority is indexer_only but sources.indexer is not configured".to_string(),
            ));
        }
        _ => {}
    }

    Ok(())
}
