use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tether_boot::BootConfig;
use tether_bridge::BridgeSettings;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Contents of the optional `--config` JSON file. Every field has a default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Directory boot images are served from.
    pub bin_dir: PathBuf,
    pub boot: BootConfig,
    pub bridge: BridgeSettings,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bin_dir: PathBuf::from("bin"),
            boot: BootConfig::default(),
            bridge: BridgeSettings::default(),
        }
    }
}

impl DaemonConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }
}
