//! Environment variable configuration
//!
//! Provides `TESTCHUNK_*` overrides for the file configuration.

use std::path::PathBuf;

use super::{AppConfig, EmptyChunkPolicy};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "TESTCHUNK";

/// Overrides read from the environment
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnvConfig {
    /// Go binary from TESTCHUNK_GO
    pub go_binary: Option<String>,
    /// Timing glob from TESTCHUNK_TIMINGS
    pub timings: Option<String>,
    /// Timing output from TESTCHUNK_TIMINGS_OUTPUT
    pub timings_output: Option<PathBuf>,
    /// Deadline in seconds from TESTCHUNK_DEADLINE
    pub deadline_secs: Option<u64>,
    /// Empty chunk tolerance from TESTCHUNK_ALLOW_EMPTY
    pub allow_empty: Option<bool>,
    /// Debug logging from TESTCHUNK_DEBUG
    pub debug: Option<bool>,
    /// Config file from TESTCHUNK_CONFIG
    pub config_file: Option<PathBuf>,
}

impl EnvConfig {
    /// Load configuration from the process environment
    pub fn load() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through a variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| {
            lookup(&format!("{ENV_PREFIX}_{name}")).filter(|value| !value.trim().is_empty())
        };

        Self {
            go_binary: get("GO"),
            timings: get("TIMINGS"),
            timings_output: get("TIMINGS_OUTPUT").map(PathBuf::from),
            deadline_secs: get("DEADLINE").and_then(|v| v.trim().parse().ok()),
            allow_empty: get("ALLOW_EMPTY").map(|v| parse_bool(&v)),
            debug: get("DEBUG").map(|v| parse_bool(&v)),
            config_file: get("CONFIG").map(PathBuf::from),
        }
    }

    /// Apply the overrides that are set
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(ref go) = self.go_binary {
            config.go_binary = go.clone();
        }
        if let Some(ref timings) = self.timings {
            config.timings = Some(timings.clone());
        }
        if let Some(ref output) = self.timings_output {
            config.timings_output = Some(output.clone());
        }
        if let Some(secs) = self.deadline_secs {
            config.deadline_secs = Some(secs);
        }
        if let Some(allow) = self.allow_empty {
            config.empty_chunk = if allow {
                EmptyChunkPolicy::Skip
            } else {
                EmptyChunkPolicy::Fail
            };
        }
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on" | "enabled"
    )
}
