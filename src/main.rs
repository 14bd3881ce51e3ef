//! testchunk - Go test chunking for parallel CI
//!
//! Splits the tests of a Go module into deterministic chunks, one per CI
//! job, optionally balanced by historical durations, and runs a chunk while
//! recording the timings that balance the next run.
//!
//! ## Usage
//!
//! ```bash
//! # List every test
//! testchunk list ./...
//!
//! # Print the run pattern of chunk 2 of 4
//! testchunk chunk --chunks 4 --chunk 2 --format run-pattern ./...
//!
//! # Run a chunk balanced by previous timings and record new ones
//! testchunk test --chunks 4 --chunk 2 --timings 'timings/*.json' \
//!     --timings-output timings/run.json ./... -- -race
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::io;
use tracing::{info, warn};

mod catalog;
mod cli;
mod config;
mod error;
mod executor;
mod models;
mod output;
mod partition;
mod timing;
mod utils;

use catalog::{packages_of, GoDiscovery, TestCatalog};
use cli::{Args, ChunkSelection};
use config::{AppConfig, EmptyChunkPolicy, EnvConfig};
use error::ChunkError;
use executor::{EventStreamRunner, OutputEcho, RunSummary, TestCommand};
use output::ChunkFormatter;
use partition::{Chunk, ChunkSpec, Partitioner};
use timing::{TimingCollector, TimingStore};
use utils::{init_logger, LogLevel, PhaseTimer};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let env = EnvConfig::load();

    init_logger(LogLevel::from_debug(
        args.debug || env.debug.unwrap_or(false),
    ));

    let config = AppConfig::resolve(args.config.as_deref(), &env)
        .context("Failed to load configuration")?;

    match args.command {
        cli::Command::List(list_args) => {
            list_tests(&config, list_args).await?;
        }
        cli::Command::Chunk(chunk_args) => {
            print_chunk(config, chunk_args).await?;
        }
        cli::Command::Test(test_args) => {
            run_chunk(config, test_args).await?;
        }
    }

    Ok(())
}

async fn list_tests(config: &AppConfig, args: cli::ListArgs) -> Result<()> {
    let catalog = discover(config, &args.patterns).await?;
    for test in catalog.iter() {
        println!("{test}");
    }
    Ok(())
}

async fn print_chunk(mut config: AppConfig, args: cli::ChunkArgs) -> Result<()> {
    if args.allow_empty {
        config.empty_chunk = EmptyChunkPolicy::Skip;
    }

    let mut timer = PhaseTimer::start();
    let catalog = discover(&config, &args.patterns).await?;
    timer.finish("discovery");

    let (spec, chunk) = select_chunk(&config, &args.selection, &catalog)?;
    timer.finish("partition");

    if !accept_chunk(&config, spec, &chunk)? {
        return Ok(());
    }

    ChunkFormatter::new(args.format)
        .write(&mut io::stdout(), &chunk, spec)
        .context("Failed to write chunk")?;
    tracing::debug!("{}", timer);
    Ok(())
}

async fn run_chunk(mut config: AppConfig, args: cli::TestArgs) -> Result<()> {
    if args.allow_empty {
        config.empty_chunk = EmptyChunkPolicy::Skip;
    }
    if args.deadline.is_some() {
        config.deadline_secs = args.deadline;
    }
    if args.timings_output.is_some() {
        config.timings_output = args.timings_output.clone();
    }
    config.validate()?;

    let mut timer = PhaseTimer::start();
    let catalog = discover(&config, &args.patterns).await?;
    timer.finish("discovery");

    let (spec, chunk) = select_chunk(&config, &args.selection, &catalog)?;
    timer.finish("partition");

    if !accept_chunk(&config, spec, &chunk)? {
        return Ok(());
    }

    let packages = packages_of(&chunk.tests)
        .iter()
        .map(|package| catalog.resolve(package))
        .collect();
    let command = TestCommand::new(&config.go_binary)
        .verbose(args.verbose)
        .count(args.count)
        .extra_args(args.extra)
        .tests(&chunk.tests, packages);

    let mut collector = TimingCollector::new(catalog.module());
    let mut summary = RunSummary::new();
    let mut echo = OutputEcho::new(io::stdout());

    let mut runner = EventStreamRunner::new(command.program(), command.args())
        .observer(&mut collector)
        .observer(&mut summary)
        .deadline(config.deadline());
    runner = if args.json {
        runner.raw_output(io::stdout())
    } else {
        runner.observer(&mut echo)
    };

    let outcome = runner.run().await;
    timer.finish("test run");

    let store = timing_store(&config, &args.selection);
    match store.save(collector.records()) {
        Ok(Some(path)) => info!("Wrote {} timings to {}", collector.records().len(), path.display()),
        Ok(None) => {}
        // a failed run is the more useful error to report
        Err(e) if outcome.is_err() => warn!("{}", e),
        Err(e) => return Err(e).context("Failed to save timings"),
    }

    let report = outcome.with_context(|| format!("{spec} failed ({summary})"))?;
    info!(
        "{} finished in {}ms: {} ({} events)",
        spec,
        report.elapsed.as_millis(),
        summary,
        report.events
    );
    tracing::debug!("{}", timer);
    Ok(())
}

async fn discover(config: &AppConfig, patterns: &[String]) -> Result<TestCatalog> {
    let catalog = GoDiscovery::new(&config.go_binary)
        .discover(patterns)
        .await
        .context("Failed to discover tests")?;
    info!(
        "Discovered {} tests in {} packages",
        catalog.len(),
        catalog.packages().len()
    );
    Ok(catalog)
}

fn timing_store(config: &AppConfig, selection: &ChunkSelection) -> TimingStore {
    let mut store = TimingStore::new();
    if let Some(pattern) = selection.timings.as_ref().or(config.timings.as_ref()) {
        store = store.with_pattern(pattern);
    }
    if let Some(ref output) = config.timings_output {
        store = store.with_output(output);
    }
    store
}

/// Resolve the chunk position and compute that chunk's tests
fn select_chunk(
    config: &AppConfig,
    selection: &ChunkSelection,
    catalog: &TestCatalog,
) -> Result<(ChunkSpec, Chunk)> {
    let (chunk, chunks) = match config::detect_env() {
        Some(position) => {
            info!(
                "Using chunk {}/{} from CI environment",
                position.chunk, position.chunks
            );
            (position.chunk, position.chunks)
        }
        None => (selection.chunk, selection.chunks),
    };
    let spec = ChunkSpec::from_position(chunk, chunks)?;

    let timings = timing_store(config, selection)
        .load()
        .context("Failed to load timings")?;
    let partitioner = Partitioner::from_timings(timings).with_default_weight(config.default_weight());

    let chunk = partitioner.chunk(&catalog.tests(), spec)?;
    match chunk.estimated {
        Some(estimate) => info!(
            "Selected {}: {} tests, estimated {:.1}s",
            spec,
            chunk.len(),
            estimate.as_secs_f64()
        ),
        None => info!("Selected {}: {} tests", spec, chunk.len()),
    }
    Ok((spec, chunk))
}

/// Apply the empty chunk policy; false means there is nothing to do
fn accept_chunk(config: &AppConfig, spec: ChunkSpec, chunk: &Chunk) -> Result<bool> {
    if !chunk.is_empty() {
        return Ok(true);
    }
    match config.empty_chunk {
        EmptyChunkPolicy::Fail => Err(ChunkError::EmptyChunk {
            chunk: spec.position(),
            total: spec.total(),
        }
        .into()),
        EmptyChunkPolicy::Skip => {
            warn!("No tests in {}, nothing to run", spec);
            Ok(false)
        }
    }
}
