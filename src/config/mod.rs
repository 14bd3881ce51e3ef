//! Configuration module
//!
//! Settings are layered: defaults, then a config file, then `TESTCHUNK_*`
//! environment variables. Command-line flags are applied last by the
//! caller.

pub mod ci;
mod env;
pub mod file;

pub use ci::{detect_env, ChunkPosition};
pub use env::{EnvConfig, ENV_PREFIX};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// What to do when the selected chunk has no tests
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyChunkPolicy {
    /// Report an error
    #[default]
    Fail,
    /// Log a warning and succeed without running anything
    Skip,
}

/// Application configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Go toolchain binary
    pub go_binary: String,

    /// Weight of tests without timing history, in milliseconds
    pub default_weight_ms: u64,

    pub empty_chunk: EmptyChunkPolicy,

    /// Glob of historical timing files
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timings: Option<String>,

    /// Where to write this run's timings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timings_output: Option<PathBuf>,

    /// Kill the test command after this many seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline_secs: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            go_binary: "go".to_string(),
            default_weight_ms: 1000,
            empty_chunk: EmptyChunkPolicy::default(),
            timings: None,
            timings_output: None,
            deadline_secs: None,
        }
    }
}

impl AppConfig {
    /// Resolve the effective configuration
    ///
    /// The file is `explicit` when given, else the one named by the
    /// environment, else the first standard location that exists.
    pub fn resolve(explicit: Option<&Path>, env: &EnvConfig) -> Result<Self> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| env.config_file.clone())
            .or_else(file::find);

        let mut config = match path {
            Some(path) => file::load(path)?,
            None => Self::default(),
        };
        env.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.go_binary.trim().is_empty() {
            anyhow::bail!("go_binary must not be empty");
        }
        if self.default_weight_ms == 0 {
            anyhow::bail!("default_weight_ms must be greater than zero");
        }
        if self.deadline_secs == Some(0) {
            anyhow::bail!("deadline_secs must be greater than zero");
        }
        Ok(())
    }

    pub fn default_weight(&self) -> Duration {
        Duration::from_millis(self.default_weight_ms)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.go_binary, "go");
        assert_eq!(config.default_weight(), crate::timing::DEFAULT_WEIGHT);
        assert_eq!(config.empty_chunk, EmptyChunkPolicy::Fail);
        assert_eq!(config.deadline(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_deadline() {
        let config = AppConfig {
            deadline_secs: Some(0),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolve_layers_file_then_env() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("testchunk.yaml");
        std::fs::write(&path, "go_binary: go1.21\ndeadline_secs: 120\n").unwrap();

        let env = EnvConfig {
            deadline_secs: Some(60),
            ..EnvConfig::default()
        };
        let config = AppConfig::resolve(Some(&path), &env).unwrap();

        assert_eq!(config.go_binary, "go1.21");
        assert_eq!(config.deadline(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_resolve_uses_env_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ci.json");
        std::fs::write(&path, r#"{"empty_chunk":"skip"}"#).unwrap();

        let env = EnvConfig {
            config_file: Some(path),
            ..EnvConfig::default()
        };
        let config = AppConfig::resolve(None, &env).unwrap();
        assert_eq!(config.empty_chunk, EmptyChunkPolicy::Skip);
    }

    #[test]
    fn test_resolve_rejects_invalid_env_override() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("testchunk.yaml");
        std::fs::write(&path, "go_binary: go\n").unwrap();

        let env = EnvConfig {
            go_binary: Some(" ".to_string()),
            ..EnvConfig::default()
        };
        assert!(AppConfig::resolve(Some(&path), &env).is_err());
    }

    #[test]
    fn test_resolve_missing_explicit_file_is_an_error() {
        let missing = PathBuf::from("/nonexistent/testchunk.yaml");
        assert!(AppConfig::resolve(Some(&missing), &EnvConfig::default()).is_err());
    }
}
