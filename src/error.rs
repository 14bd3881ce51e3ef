//! Error types for test discovery, chunking and execution
//!
//! Every variant carries enough context to act on a CI failure without
//! re-running with more verbosity.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, ChunkError>;

/// Errors surfaced by the chunking core
#[derive(Error, Debug)]
pub enum ChunkError {
    /// Enumerating packages or tests failed
    #[error("test discovery failed while {action}:\n{output}")]
    Discovery {
        /// What was being attempted
        action: String,
        /// Diagnostic output of the listing command, verbatim
        output: String,
    },

    /// Chunk index or total outside the accepted range
    #[error("chunk index {index} out of bounds (total chunks: {total})")]
    PartitionBounds { index: i64, total: i64 },

    /// A valid chunk resolved to no tests
    #[error("no tests in chunk {chunk} of {total}")]
    EmptyChunk { chunk: usize, total: usize },

    /// The test command could not be started, exited unsuccessfully or
    /// overran its deadline
    #[error("test command `{command}` {status}\n{stderr}")]
    Subprocess {
        command: String,
        status: String,
        stderr: String,
    },

    /// A line of structured test output could not be decoded
    #[error("error decoding test output at line {line}: {text}")]
    Decode {
        line: usize,
        text: String,
        #[source]
        source: serde_json::Error,
    },

    /// Reading the test command's output stream failed
    #[error("error reading test output: {0}")]
    Stream(#[source] std::io::Error),

    /// A registered observer rejected an event
    #[error("error handling event in {observer}")]
    Observer {
        observer: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Timing files could not be read, parsed or written
    #[error("timing data error for {}: {message}", path.display())]
    Persistence { path: PathBuf, message: String },
}

impl ChunkError {
    /// Build a persistence error for a path
    pub fn persistence(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        ChunkError::Persistence {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Build a discovery error from an action description and command output
    pub fn discovery(action: impl Into<String>, output: impl Into<String>) -> Self {
        ChunkError::Discovery {
            action: action.into(),
            output: output.into(),
        }
    }
}
