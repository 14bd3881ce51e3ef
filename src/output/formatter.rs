//! Chunk output formats
//!
//! Renders a selected chunk for consumption by shell scripts and CI steps.

#![allow(dead_code)]

use clap::ValueEnum;
use serde::Serialize;
use std::io::Write;

use crate::catalog::packages_of;
use crate::executor::run_selector;
use crate::partition::{Chunk, ChunkSpec};

/// How a chunk is printed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ChunkFormat {
    /// One bare test name per line
    #[default]
    Tests,
    /// One `./package` path per line
    Packages,
    /// A `go test -run` expression
    RunPattern,
    /// The chunk with its tests and estimated duration
    Json,
}

impl ChunkFormat {
    pub fn name(&self) -> &'static str {
        match self {
            ChunkFormat::Tests => "tests",
            ChunkFormat::Packages => "packages",
            ChunkFormat::RunPattern => "run-pattern",
            ChunkFormat::Json => "json",
        }
    }
}

#[derive(Serialize)]
struct ChunkDocument<'a> {
    chunk: usize,
    chunks: usize,
    #[serde(flatten)]
    body: &'a Chunk,
}

/// Chunk formatter
pub struct ChunkFormatter {
    format: ChunkFormat,
}

impl ChunkFormatter {
    pub fn new(format: ChunkFormat) -> Self {
        Self { format }
    }

    /// Render `chunk`, selected by `spec`
    pub fn format(&self, chunk: &Chunk, spec: ChunkSpec) -> serde_json::Result<String> {
        let text = match self.format {
            ChunkFormat::Tests => chunk
                .tests
                .iter()
                .map(|test| test.name.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
            ChunkFormat::Packages => packages_of(&chunk.tests)
                .iter()
                .map(|package| relative_path(package))
                .collect::<Vec<_>>()
                .join("\n"),
            ChunkFormat::RunPattern => run_selector(&chunk.tests),
            ChunkFormat::Json => serde_json::to_string_pretty(&ChunkDocument {
                chunk: spec.position(),
                chunks: spec.total(),
                body: chunk,
            })?,
        };
        Ok(text)
    }

    /// Render and write `chunk` followed by a newline when non-empty
    pub fn write<W: Write>(&self, writer: &mut W, chunk: &Chunk, spec: ChunkSpec) -> anyhow::Result<()> {
        let text = self.format(chunk, spec)?;
        if !text.is_empty() {
            writeln!(writer, "{text}")?;
        }
        Ok(())
    }
}

/// `./`-prefixed path of a module-relative package
fn relative_path(package: &str) -> String {
    if package == "." {
        ".".to_string()
    } else {
        format!("./{package}")
    }
}
