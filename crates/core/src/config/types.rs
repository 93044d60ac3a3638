use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::orchestrator::SourcePriority;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorSettings,
    #[serde(default)]
    pub sources: SourcesConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("bookhound.db")
}

/// Orchestrator behavior settings from the config file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrchestratorSettings {
    /// Which source is tried first and whether fallback is permitted.
    #[serde(default)]
    pub priority: SourcePriority,
    /// Dispatch the top candidate automatically when its tier is High.
    #[serde(default = "default_auto_select")]
    pub auto_select: bool,
    /// Minimum confidence score (0-100) for a candidate to be viable.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: u8,
    /// Interval between reconciliation sweeps, in seconds.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            priority: SourcePriority::default(),
            auto_select: default_auto_select(),
            min_confidence: default_min_confidence(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_auto_select() -> bool {
    true
}

fn default_min_confidence() -> u8 {
    50
}

fn default_sweep_interval() -> u64 {
    30
}

/// Per-source configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub direct_archive: Option<DirectArchiveConfig>,
    #[serde(default)]
    pub indexer: Option<IndexerConfig>,
    #[serde(default)]
    pub download_client: Option<DownloadClientConfig>,
}

/// Direct archive mirror configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DirectArchiveConfig {
    /// Mirror base URL (e.g., "http://localhost:8090").
    pub url: String,
    /// API key, if the mirror requires one.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Maximum successful downloads per UTC calendar day (0 = unlimited).
    #[serde(default = "default_daily_cap")]
    pub daily_cap: u32,
    /// Request timeout in seconds (default: 30).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_daily_cap() -> u32 {
    25
}

/// Torznab-style indexer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexerConfig {
    /// Indexer base URL (e.g., "http://localhost:9696").
    pub url: String,
    /// Indexer API key.
    pub api_key: String,
    /// Human-readable indexer name recorded on download records.
    #[serde(default = "default_indexer_name")]
    pub name: String,
    /// Request timeout in seconds (default: 30).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_indexer_name() -> String {
    "indexer".to_string()
}

/// Download client configuration (drives indexer submissions).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadClientConfig {
    /// Client base URL (e.g., "http://localhost:6800").
    pub url: String,
    /// API key, if the client requires one.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Category/label applied to submitted jobs.
    #[serde(default)]
    pub category: Option<String>,
    /// Request timeout in seconds (default: 30).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_timeout() -> u32 {
    30
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub orchestrator: OrchestratorSettings,
    pub sources: SanitizedSourcesConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedSourcesConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direct_archive: Option<SanitizedDirectArchiveConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexer: Option<SanitizedIndexerConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_client: Option<SanitizedDownloadClientConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedDirectArchiveConfig {
    pub url: String,
    pub api_key_configured: bool,
    pub daily_cap: u32,
    pub timeout_secs: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedIndexerConfig {
    pub url: String,
    pub name: String,
    pub api_key_configured: bool,
    pub timeout_secs: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedDownloadClientConfig {
    pub url: String,
    pub api_key_configured: bool,
    pub timeout_secs: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            orchestrator: config.orchestrator.clone(),
            sources: SanitizedSourcesConfig {
                direct_archive: config.sources.direct_archive.as_ref().map(|c| {
                    SanitizedDirectArchiveConfig {
                        url: c.url.clone(),
                        api_key_configured: c.api_key.is_some(),
                        daily_cap: c.daily_cap,
                        timeout_secs: c.timeout_secs,
                    }
                }),
                indexer: config.sources.indexer.as_ref().map(|c| SanitizedIndexerConfig {
                    url: c.url.clone(),
                    name: c.name.clone(),
                    api_key_configured: !c.api_key.is_empty(),
                    timeout_secs: c.timeout_secs,
                }),
                download_client: config.sources.download_client.as_ref().map(|c| {
                    SanitizedDownloadClientConfig {
                        url: c.url.clone(),
                        api_key_configured: c.api_key.is_some(),
                        timeout_secs: c.timeout_secs,
                    }
                }),
            },
        }
    }
}
