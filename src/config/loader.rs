// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::model::{RawConfigFile, ServiceConfig};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** validate
/// anything. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and run validation.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ServiceConfig> {
    let raw_config = load_from_path(&path)?;
    let config = ServiceConfig::try_from(raw_config)?;
    Ok(config)
}

/// Like [`load_and_validate`], except that a missing file yields the
/// built-in defaults.
///
/// Used for the default config path, which is allowed not to exist. An
/// explicitly requested file should go through `load_and_validate` so a typo
/// is reported.
pub fn load_or_default(path: impl AsRef<Path>) -> Result<ServiceConfig> {
    let path = path.as_ref();
    if !path.exists() {
        info!(path = %path.display(), "no config file found; using defaults");
        return Ok(ServiceConfig::default());
    }
    load_and_validate(path)
}

/// Default config location: `Testdrive.toml` in the working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Testdrive.toml")
}
