//! Timing storage and aggregation
//!
//! Historical per-test durations are kept as JSON arrays of
//! `{"package", "test", "time"}` records. Loading several files averages
//! every observation of the same test.

#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{ChunkError, Result};
use crate::models::Test;

/// Weight given to a test without recorded timing
pub const DEFAULT_WEIGHT: Duration = Duration::from_secs(1);

/// One observed or averaged execution time for a test
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingRecord {
    pub package: String,

    pub test: String,

    #[serde(with = "super::nanos")]
    pub time: Duration,
}

impl TimingRecord {
    pub fn new(package: impl Into<String>, test: impl Into<String>, time: Duration) -> Self {
        Self {
            package: package.into(),
            test: test.into(),
            time,
        }
    }

    /// Test identity the record belongs to
    pub fn key(&self) -> Test {
        Test::new(&self.package, &self.test)
    }
}

/// Averaged duration per test, rebuilt fresh for every invocation
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TimingTable {
    durations: BTreeMap<Test, Duration>,
}

impl TimingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Average every record per test
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a TimingRecord>) -> Self {
        let mut totals: BTreeMap<Test, (u128, u128)> = BTreeMap::new();
        for record in records {
            let entry = totals.entry(record.key()).or_default();
            entry.0 += record.time.as_nanos();
            entry.1 += 1;
        }

        let durations = totals
            .into_iter()
            .map(|(test, (total, count))| {
                let mean = u64::try_from(total / count).unwrap_or(u64::MAX);
                (test, Duration::from_nanos(mean))
            })
            .collect();

        Self { durations }
    }

    pub fn insert(&mut self, test: Test, duration: Duration) {
        self.durations.insert(test, duration);
    }

    pub fn get(&self, test: &Test) -> Option<Duration> {
        self.durations.get(test).copied()
    }

    /// Weight used for balancing; unknown and zero timings fall back to
    /// `default`
    pub fn weight_of(&self, test: &Test, default: Duration) -> Duration {
        match self.get(test) {
            Some(duration) if !duration.is_zero() => duration,
            _ => default,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Test, &Duration)> {
        self.durations.iter()
    }

    pub fn len(&self) -> usize {
        self.durations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }
}

/// Loads historical timings and persists newly observed ones
#[derive(Clone, Debug, Default)]
pub struct TimingStore {
    /// Glob selecting historical timing files
    pattern: Option<String>,

    /// Destination for this run's timings
    output: Option<PathBuf>,
}

impl TimingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    pub fn output(&self) -> Option<&Path> {
        self.output.as_deref()
    }

    /// Load the configured history
    ///
    /// Returns `None` when no pattern is configured or the pattern matches
    /// no files.
    pub fn load(&self) -> Result<Option<TimingTable>> {
        match &self.pattern {
            Some(pattern) => load_pattern(pattern),
            None => Ok(None),
        }
    }

    /// Persist records to the configured output, if any
    pub fn save(&self, records: &[TimingRecord]) -> Result<Option<PathBuf>> {
        match &self.output {
            Some(path) => {
                write_records(records, path)?;
                Ok(Some(path.clone()))
            }
            None => Ok(None),
        }
    }
}

/// Load and average every file matching a glob pattern
///
/// A pattern that matches nothing means no weighting is available; that is
/// not an error. Files that do match must all be readable, and a plain path
/// without glob characters must exist.
pub fn load_pattern(pattern: &str) -> Result<Option<TimingTable>> {
    if !is_glob(pattern) {
        return load_files(&[pattern]).map(Some);
    }

    let paths = glob::glob(pattern)
        .map_err(|e| ChunkError::persistence(pattern, format!("invalid pattern: {e}")))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| ChunkError::persistence(e.path(), e.error()))?;

    if paths.is_empty() {
        warn!("No timing files match {}; balancing by test count", pattern);
        return Ok(None);
    }

    load_files(&paths).map(Some)
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

/// Load and average explicitly requested timing files
pub fn load_files<P: AsRef<Path>>(paths: &[P]) -> Result<TimingTable> {
    let mut records = Vec::new();
    for path in paths {
        records.extend(read_records(path.as_ref())?);
    }

    let table = TimingTable::from_records(&records);
    info!(
        "Loaded timings for {} tests from {} files",
        table.len(),
        paths.len()
    );
    Ok(table)
}

/// Read one timing file
pub fn read_records(path: &Path) -> Result<Vec<TimingRecord>> {
    let file = File::open(path).map_err(|e| ChunkError::persistence(path, e))?;
    let reader = BufReader::new(file);

    let records: Vec<TimingRecord> = serde_json::from_reader(reader)
        .map_err(|e| ChunkError::persistence(path, format!("invalid timing data: {e}")))?;

    debug!("Read {} timing records from {}", records.len(), path.display());
    Ok(records)
}

/// Replace the destination with the given records
///
/// Writes to a sibling temporary file first so a crash never leaves a
/// half-written timing file behind.
pub fn write_records(records: &[TimingRecord], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ChunkError::persistence(parent, e))?;
    }

    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    let staging = PathBuf::from(staging);

    let file = File::create(&staging).map_err(|e| ChunkError::persistence(&staging, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, records)
        .map_err(|e| ChunkError::persistence(&staging, e))?;
    writer
        .flush()
        .map_err(|e| ChunkError::persistence(&staging, e))?;
    drop(writer);

    fs::rename(&staging, path).map_err(|e| ChunkError::persistence(path, e))?;

    info!("Saved {} timing records to {}", records.len(), path.display());
    Ok(())
}
