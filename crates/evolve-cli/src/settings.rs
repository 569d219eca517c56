//! Configuration file discovery and loading.

use anyhow::{Context, Result};
use evolve_core::EvolveConfig;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory under the platform config dir holding evolve's files.
pub const APP_DIR: &str = "evolve";

/// Configuration file name.
pub const CONFIG_FILE: &str = "config.toml";

/// Default configuration path, e.g. `~/.config/evolve/config.toml` on Linux.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

/// Loads the configuration.
///
/// An explicit path must exist. Without one, the default path is read if
/// present and built-in defaults are used otherwise.
pub fn load(explicit: Option<&Path>) -> Result<EvolveConfig> {
    if let Some(path) = explicit {
        return read(path);
    }
    match default_config_path() {
        Some(path) if path.is_file() => read(&path),
        _ => {
            debug!("No configuration file found, using defaults");
            Ok(EvolveConfig::default())
        }
    }
}

/// Reads and validates one configuration file.
pub fn read(path: &Path) -> Result<EvolveConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config = EvolveConfig::from_toml_str(&text)
        .with_context(|| format!("invalid config file {}", path.display()))?;
    debug!(path = %path.display(), "Configuration loaded");
    Ok(config)
}
