//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::output::ChunkFormat;

/// Split Go tests into chunks for parallel CI jobs
#[derive(Parser, Debug)]
#[command(name = "testchunk")]
#[command(version)]
#[command(about = "Split Go tests into balanced chunks for parallel CI jobs")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Configuration file (YAML or JSON)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List every discovered test as package.Name
    List(ListArgs),

    /// Print the tests of one chunk
    Chunk(ChunkArgs),

    /// Run the tests of one chunk
    Test(TestArgs),
}

/// Arguments for list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Package patterns (defaults to the current directory)
    pub patterns: Vec<String>,
}

/// Chunk selection shared by `chunk` and `test`
///
/// CI provider variables take precedence over `--chunk` and `--chunks`.
#[derive(clap::Args, Debug, Clone)]
pub struct ChunkSelection {
    /// Number of chunks to split tests into
    #[arg(long, default_value = "1")]
    pub chunks: i64,

    /// Which chunk to select (1-based)
    #[arg(long, default_value = "1")]
    pub chunk: i64,

    /// Glob of timing files used to balance chunks by duration
    #[arg(long)]
    pub timings: Option<String>,
}

/// Arguments for chunk command
#[derive(Parser, Debug)]
pub struct ChunkArgs {
    #[command(flatten)]
    pub selection: ChunkSelection,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = ChunkFormat::Tests)]
    pub format: ChunkFormat,

    /// Exit successfully when the selected chunk has no tests
    #[arg(long)]
    pub allow_empty: bool,

    /// Package patterns (defaults to the current directory)
    pub patterns: Vec<String>,
}

/// Arguments for test command
#[derive(Parser, Debug)]
pub struct TestArgs {
    #[command(flatten)]
    pub selection: ChunkSelection,

    /// Write the timings observed in this run to a file
    #[arg(long)]
    pub timings_output: Option<PathBuf>,

    /// Run each test this many times
    #[arg(long)]
    pub count: Option<u32>,

    /// Verbose go test output
    #[arg(short, long)]
    pub verbose: bool,

    /// Print the raw JSON event stream instead of test output
    #[arg(long)]
    pub json: bool,

    /// Exit successfully when the selected chunk has no tests
    #[arg(long)]
    pub allow_empty: bool,

    /// Kill the test run after this many seconds
    #[arg(long)]
    pub deadline: Option<u64>,

    /// Package patterns (defaults to the current directory)
    pub patterns: Vec<String>,

    /// Extra arguments passed to go test
    #[arg(last = true)]
    pub extra: Vec<String>,
}
