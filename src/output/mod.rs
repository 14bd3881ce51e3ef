//! Output formatting
//!
//! Renders chunks for shell scripts and CI steps.

mod formatter;

pub use formatter::{ChunkFormat, ChunkFormatter};
