//! Reading configuration documents.

use std::path::Path;

use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};
use crate::schema::RuntimeConfig;

/// Parses and validates a TOML document.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys and
/// [`ConfigError::Invalid`] for out-of-range values.
pub fn from_toml_str(document: &str) -> ConfigResult<RuntimeConfig> {
    let config: RuntimeConfig = toml::from_str(document)?;
    config.validate()?;
    Ok(config)
}

/// Reads, parses and validates the configuration file at `path`.
///
/// # Errors
///
/// Returns [`ConfigError::Read`] when the file cannot be read, plus the
/// errors of [`from_toml_str`].
pub fn load(path: &Path) -> ConfigResult<RuntimeConfig> {
    let document = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = from_toml_str(&document)?;
    info!(path = %path.display(), "configuration loaded");
    Ok(config)
}

/// Like [`load`], but a missing file yields the defaults.
///
/// # Errors
///
/// Same as [`load`] for files that exist.
pub fn load_or_default(path: &Path) -> ConfigResult<RuntimeConfig> {
    if path.exists() {
        load(path)
    } else {
        debug!(path = %path.display(), "no configuration file; using defaults");
        Ok(RuntimeConfig::default())
    }
}
