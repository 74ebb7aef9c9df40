//! Receiver configuration save/load (JSON).

use std::path::Path;

use tracing::instrument;

use crate::error::ConfigurationError;
use crate::types::ReceiverConfig;

/// Loads a receiver configuration from `path`. The result is not validated yet.
#[instrument(level = "trace", skip(path))]
pub fn load_config(path: &Path) -> Result<ReceiverConfig, ConfigurationError> {
  let bytes = std::fs::read(path)
    .map_err(|e| ConfigurationError::Io(format!("{}: {}", path.display(), e)))?;
  serde_json::from_slice(&bytes)
    .map_err(|e| ConfigurationError::Parse(format!("{}: {}", path.display(), e)))
}

/// Loads a JSON array of receiver configurations from `path`.
#[instrument(level = "trace", skip(path))]
pub fn load_configs(path: &Path) -> Result<Vec<ReceiverConfig>, ConfigurationError> {
  let bytes = std::fs::read(path)
    .map_err(|e| ConfigurationError::Io(format!("{}: {}", path.display(), e)))?;
  serde_json::from_slice(&bytes)
    .map_err(|e| ConfigurationError::Parse(format!("{}: {}", path.display(), e)))
}

/// Saves a receiver configuration to `path` as pretty JSON, creating parent directories.
#[instrument(level = "trace", skip(path, config))]
pub fn save_config(path: &Path, config: &ReceiverConfig) -> Result<(), std::io::Error> {
  let json = serde_json::to_string_pretty(config)
    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent)?;
  }
  std::fs::write(path, json)
}
