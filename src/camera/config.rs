//! Process configuration.
//!
//! Everything here is read once at startup. The camera section describes
//! the emulated sensor; the stream section says where frames go and where
//! recorded captures live.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::CameraSpec;

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid frame dimensions")]
    InvalidDimensions,
    #[error("invalid frame rate (must be 1-120 fps)")]
    InvalidFrameRate,
    #[error("socket path must not be empty")]
    EmptySocketPath,
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Output socket and capture settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Unix socket the recorder listens on.
    pub socket_path: PathBuf,
    /// Directory recorded captures are resolved against.
    pub cptv_dir: PathBuf,
    /// Wait between failed connection attempts, in seconds.
    pub reconnect_backoff_secs: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from("/var/run/lepton-frames"),
            cptv_dir: PathBuf::from("/cptv-files"),
            reconnect_backoff_secs: 30,
        }
    }
}

impl StreamConfig {
    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_secs(self.reconnect_backoff_secs)
    }
}

/// HTTP control server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Serve the control API at all.
    pub enabled: bool,
    /// Port to listen on (all interfaces).
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 2040,
        }
    }
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub camera: CameraSpec,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.camera.validate()?;
        if self.stream.socket_path.as_os_str().is_empty() {
            return Err(ConfigError::EmptySocketPath);
        }
        Ok(())
    }
}
