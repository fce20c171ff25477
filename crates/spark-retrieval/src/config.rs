//! Configuration for the retrieval checker
//!
//! Every section has working defaults, so an empty TOML document is a valid
//! configuration. Endpoint URLs and the RPC token can be overridden from the
//! environment.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::retry::RetryConfig;

/// Size above which a CAR payload is flagged as too large
pub const MAX_CAR_SIZE: u64 = 200 * 1024 * 1024;

/// Hard deadline for a single retrieval
pub const MAX_REQUEST_DURATION_MS: u64 = 90_000;

pub const DEFAULT_RPC_URL: &str = "https://api.calibration.node.glif.io/";
pub const DEFAULT_INDEXER_URL: &str = "https://cid.contact";

pub const ENV_RPC_URL: &str = "SPARK_RPC_URL";
pub const ENV_RPC_AUTH: &str = "SPARK_RPC_AUTH";
pub const ENV_INDEXER_URL: &str = "SPARK_IPNI_URL";
pub const ENV_LASSIE_URL: &str = "SPARK_LASSIE_URL";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SparkConfig {
    pub rpc: RpcConfig,
    pub indexer: IndexerConfig,
    pub retrieval: RetrievalConfig,
    pub peer_id: PeerIdConfig,
    pub queue: QueueConfig,
    pub logging: LoggingConfig,
}

impl SparkConfig {
    /// Parse a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).context("Invalid configuration")
    }

    /// Load a TOML file and apply environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read configuration file {}", path.display()))?;
        let mut config = Self::from_toml_str(&source)
            .with_context(|| format!("Cannot load configuration file {}", path.display()))?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `SPARK_*` overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup. Empty values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(url) = get(ENV_RPC_URL) {
            self.rpc.url = url;
        }
        if let Some(token) = get(ENV_RPC_AUTH) {
            self.rpc.auth_token = Some(token);
        }
        if let Some(url) = get(ENV_INDEXER_URL) {
            self.indexer.base_url = url;
        }
        if let Some(url) = get(ENV_LASSIE_URL) {
            self.retrieval.lassie_url = Some(url);
        }
    }
}

/// Chain JSON-RPC endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    pub url: String,

    /// Sent as a bearer token when present
    pub auth_token: Option<String>,

    pub request_timeout_ms: u64,

    pub retry: RetryConfig,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_RPC_URL.to_string(),
            auth_token: None,
            request_timeout_ms: 60_000,
            retry: RetryConfig::chain_rpc(),
        }
    }
}

impl RpcConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Content-routing index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    pub base_url: String,
    pub retry: RetryConfig,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_INDEXER_URL.to_string(),
            retry: RetryConfig::default(),
        }
    }
}

/// Limits applied to the download from the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Abort when no data arrives for this long
    pub idle_timeout_ms: u64,

    /// Abort when the whole retrieval takes longer than this
    pub max_request_duration_ms: u64,

    /// Payloads above this size are flagged, not aborted
    pub max_car_size: u64,

    pub head_timeout_ms: u64,

    /// Request the whole DAG instead of the root block only
    pub full_verification: bool,

    /// HTTP daemon used for Graphsync retrievals
    pub lassie_url: Option<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            idle_timeout_ms: 60_000,
            max_request_duration_ms: MAX_REQUEST_DURATION_MS,
            max_car_size: MAX_CAR_SIZE,
            head_timeout_ms: 10_000,
            full_verification: true,
            lassie_url: None,
        }
    }
}

impl RetrievalConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn max_request_duration(&self) -> Duration {
        Duration::from_millis(self.max_request_duration_ms)
    }

    pub fn head_timeout(&self) -> Duration {
        Duration::from_millis(self.head_timeout_ms)
    }
}

/// Priority of the peer-id sources
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerIdSourceOrder {
    #[default]
    MinerInfoOnly,
    ContractFirst,
    MinerInfoFirst,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerIdConfig {
    pub order: PeerIdSourceOrder,

    /// Time box applied to each source, retries included
    pub source_timeout_ms: u64,
}

impl Default for PeerIdConfig {
    fn default() -> Self {
        Self {
            order: PeerIdSourceOrder::default(),
            source_timeout_ms: 120_000,
        }
    }
}

impl PeerIdConfig {
    pub fn source_timeout(&self) -> Duration {
        Duration::from_millis(self.source_timeout_ms)
    }
}

/// Dispute queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub max_concurrent_checks: usize,

    /// Re-poll pending disputes at this interval. Polled once at start when unset.
    pub poll_interval_secs: Option<u64>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent_checks: 1,
            poll_interval_secs: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
