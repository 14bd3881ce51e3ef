//! Configuration file management
//!
//! Handles finding and loading configuration files.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::AppConfig;

/// Configuration file locations (in order of precedence)
const CONFIG_LOCATIONS: &[&str] = &[
    "./testchunk.yaml",
    "./.testchunk.yaml",
    "~/.config/testchunk/config.yaml",
];

/// First existing file among the standard locations
pub fn find() -> Option<PathBuf> {
    CONFIG_LOCATIONS
        .iter()
        .map(|location| expand_path(location))
        .find(|path| path.exists())
}

/// Load and validate a configuration file
///
/// YAML is expected for `.yaml`/`.yml` files, JSON otherwise. Missing keys
/// take their default values.
pub fn load(path: impl AsRef<Path>) -> Result<AppConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: AppConfig = if is_yaml_file(path) {
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
    };

    config
        .validate()
        .with_context(|| format!("Invalid config file: {}", path.display()))?;
    debug!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Expand ~ to home directory
pub(crate) fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Check if file is YAML based on extension
fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}
