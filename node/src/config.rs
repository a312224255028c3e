//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use dpos_types::{ChainParams, NetworkId};

use crate::logging::LogFormat;
use crate::NodeError;

/// Configuration for a chain database node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Which network's chain parameters to use.
    #[serde(default = "default_network")]
    pub network: NetworkId,

    /// Data directory for the LMDB environment.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Genesis JSON. Required the first time a data directory is opened.
    #[serde(default)]
    pub genesis_file: Option<PathBuf>,

    /// LMDB map size in bytes.
    #[serde(default = "default_map_size")]
    pub map_size: usize,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Whether to dump Prometheus metrics at shutdown.
    #[serde(default)]
    pub enable_metrics: bool,

    #[serde(default)]
    pub producer: ProducerConfig,
}

/// Local block production.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProducerConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Hex-encoded signing keys of locally run delegates.
    #[serde(default)]
    pub signing_keys: Vec<String>,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_network() -> NetworkId {
    NetworkId::Dev
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./dpos_data")
}

fn default_map_size() -> usize {
    1 << 30
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, NodeError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    pub fn params(&self) -> ChainParams {
        ChainParams::for_network(self.network)
    }

    pub fn log_format(&self) -> Result<LogFormat, NodeError> {
        match self.log_format.as_str() {
            "human" => Ok(LogFormat::Human),
            "json" => Ok(LogFormat::Json),
            other => Err(NodeError::Config(format!(
                "unknown log format '{}', expected human or json",
                other
            ))),
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            data_dir: default_data_dir(),
            genesis_file: None,
            map_size: default_map_size(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            enable_metrics: false,
            producer: ProducerConfig::default(),
        }
    }
}
