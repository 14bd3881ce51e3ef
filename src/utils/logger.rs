//! Logging utilities
//!
//! Logs go to stderr so stdout stays parseable by CI scripts.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Log level configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
}

impl LogLevel {
    /// Debug when requested, info otherwise
    pub fn from_debug(debug: bool) -> Self {
        if debug {
            LogLevel::Debug
        } else {
            LogLevel::Info
        }
    }

    pub fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
        }
    }

    /// Filter directive for this crate's events
    fn directive(self) -> String {
        format!(
            "{}={}",
            env!("CARGO_CRATE_NAME"),
            self.to_tracing_level().as_str().to_lowercase()
        )
    }
}

/// Initialize the logger with specified level
///
/// `RUST_LOG` takes precedence when set.
pub fn init_logger(level: LogLevel) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.directive()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
