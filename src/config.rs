/// Bridge configuration
///
/// Every field has a default, so a config file only needs to name what it
/// changes. Command line flags are applied on top by the binary.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::correlator::CorrelatorConfig;
use crate::mcp::ServerSettings;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Host and port one of the two servers binds to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_mcp() -> Endpoint {
    Endpoint {
        host: default_host(),
        port: 11809,
    }
}

fn default_channel() -> Endpoint {
    Endpoint {
        host: default_host(),
        port: 11808,
    }
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_stale_after_secs() -> u64 {
    60
}

fn default_sweep_interval_secs() -> u64 {
    10
}

fn default_sse_keepalive_secs() -> u64 {
    30
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Protocol server (JSON-RPC over HTTP)
    #[serde(default = "default_mcp")]
    pub mcp: Endpoint,
    /// Socket server the browser extension connects to
    #[serde(default = "default_channel")]
    pub channel: Endpoint,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_sse_keepalive_secs")]
    pub sse_keepalive_secs: u64,
    /// Saved selector presets; default lookup when unset
    #[serde(default)]
    pub selectors_file: Option<PathBuf>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            mcp: default_mcp(),
            channel: default_channel(),
            request_timeout_secs: default_request_timeout_secs(),
            stale_after_secs: default_stale_after_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            sse_keepalive_secs: default_sse_keepalive_secs(),
            selectors_file: None,
        }
    }
}

impl BridgeConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `path` if given, else the per-user config file if it exists
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => match default_config_path() {
                Some(path) if path.is_file() => {
                    tracing::debug!("Using config file {}", path.display());
                    Self::load(&path)
                }
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let durations = [
            ("request_timeout_secs", self.request_timeout_secs),
            ("stale_after_secs", self.stale_after_secs),
            ("sweep_interval_secs", self.sweep_interval_secs),
            ("sse_keepalive_secs", self.sse_keepalive_secs),
        ];
        if let Some((name, _)) = durations.iter().find(|(_, secs)| *secs == 0) {
            return Err(ConfigError::Invalid(format!("{} must be greater than zero", name)));
        }

        // The sweep must never reach a request whose caller is still inside its timeout
        if self.stale_after_secs <= self.request_timeout_secs {
            return Err(ConfigError::Invalid(format!(
                "stale_after_secs ({}) must exceed request_timeout_secs ({})",
                self.stale_after_secs, self.request_timeout_secs
            )));
        }

        if self.mcp == self.channel {
            return Err(ConfigError::Invalid(format!(
                "protocol server and extension socket both bind {}",
                self.mcp.addr()
            )));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn correlator(&self) -> CorrelatorConfig {
        CorrelatorConfig {
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
            stale_after: Duration::from_secs(self.stale_after_secs),
        }
    }

    pub fn server_settings(&self) -> ServerSettings {
        ServerSettings {
            host: self.mcp.host.clone(),
            port: self.mcp.port,
            request_timeout: self.request_timeout(),
            sse_keepalive: Duration::from_secs(self.sse_keepalive_secs),
        }
    }
}

/// `<config_dir>/browser-bridge/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("browser-bridge").join("config.json"))
}
