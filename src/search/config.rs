//! Search configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use strum::{Display, EnumString};

/// Which search engine the index lives in
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Elasticsearch,
    Solr,
    Memory,
}

/// Search service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Backend engine
    #[serde(default)]
    pub backend: BackendKind,

    /// Base URL of the engine (unused by the memory backend)
    #[serde(default = "default_url")]
    pub url: String,

    /// Stable alias all readers go through; versioned indices are `{alias}{n}`
    #[serde(default = "default_alias")]
    pub alias: String,

    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum page size accepted by `search`
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,

    /// Directory holding `<backend>.json` mapping overrides
    #[serde(default)]
    pub mapping_dir: Option<PathBuf>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            url: default_url(),
            alias: default_alias(),
            request_timeout_secs: default_request_timeout(),
            max_rows: default_max_rows(),
            mapping_dir: None,
        }
    }
}

/// Reindex job configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReindexConfig {
    /// Records copied per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Default cancellation attempts for `stop`
    #[serde(default = "default_stop_attempts")]
    pub stop_attempts: u32,

    /// Default pause between cancellation attempts (milliseconds)
    #[serde(default = "default_stop_delay_ms")]
    pub stop_delay_ms: u64,
}

impl Default for ReindexConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            stop_attempts: default_stop_attempts(),
            stop_delay_ms: default_stop_delay_ms(),
        }
    }
}

fn default_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_alias() -> String {
    "oai-items".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_rows() -> usize {
    1000
}

fn default_batch_size() -> usize {
    100
}

fn default_stop_attempts() -> u32 {
    5
}

fn default_stop_delay_ms() -> u64 {
    500
}

/// Builder for SearchConfig
pub struct SearchConfigBuilder {
    config: SearchConfig,
}

impl SearchConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SearchConfig::default(),
        }
    }

    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.url = url.into();
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.config.alias = alias.into();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn max_rows(mut self, max: usize) -> Self {
        self.config.max_rows = max;
        self
    }

    pub fn mapping_dir(mut self, dir: PathBuf) -> Self {
        self.config.mapping_dir = Some(dir);
        self
    }

    pub fn build(self) -> SearchConfig {
        self.config
    }
}

impl Default for SearchConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
