//! Server configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use sluice_core::error::{AnalyticsError, AnalyticsResult};

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Engine configuration file; defaults apply when absent
    #[serde(default)]
    pub engine_config: Option<PathBuf>,

    /// Seed of the built-in mock data provider
    #[serde(default = "default_mock_seed")]
    pub mock_seed: u64,

    /// Number of obligors the mock provider generates
    #[serde(default = "default_mock_obligors")]
    pub mock_obligors: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_mock_seed() -> u64 {
    42
}

fn default_mock_obligors() -> usize {
    100
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            engine_config: None,
            mock_seed: default_mock_seed(),
            mock_obligors: default_mock_obligors(),
        }
    }
}

impl ServerConfig {
    /// Parse configuration from TOML.
    pub fn from_toml_str(content: &str) -> AnalyticsResult<Self> {
        toml::from_str(content).map_err(|e| AnalyticsError::configuration("server", e.to_string()))
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> AnalyticsResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AnalyticsError::configuration("server", format!("{}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }
}
