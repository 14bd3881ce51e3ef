//! Test partitioning
//!
//! Splits a test set into `total` chunks so that every test lands in
//! exactly one chunk. Two strategies are available:
//!
//! - [`Strategy::Equal`]: contiguous, equally sized ranges of the sorted
//!   test list
//! - [`Strategy::Weighted`]: longest-processing-time-first balancing on
//!   historical durations
//!
//! Both are pure functions of their input, so every CI slot computes the
//! same assignment independently.

#![allow(dead_code)]

mod equal;
mod weighted;

use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tracing::debug;

use crate::error::{ChunkError, Result};
use crate::models::Test;
use crate::timing::{TimingTable, DEFAULT_WEIGHT};

/// A validated chunk address: 0-based index within `total` chunks
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChunkSpec {
    index: usize,
    total: usize,
}

impl ChunkSpec {
    /// Validate a 0-based index against a chunk total
    pub fn new(index: i64, total: i64) -> Result<Self> {
        if total < 1 || index < 0 || index >= total {
            return Err(ChunkError::PartitionBounds { index, total });
        }
        Ok(Self {
            index: index as usize,
            total: total as usize,
        })
    }

    /// Validate a 1-based chunk position as used on the command line
    pub fn from_position(chunk: i64, chunks: i64) -> Result<Self> {
        Self::new(chunk - 1, chunks)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// 1-based position
    pub fn position(&self) -> usize {
        self.index + 1
    }
}

impl fmt::Display for ChunkSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chunk {}/{}", self.position(), self.total)
    }
}

/// One slot's share of the tests
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// 0-based index
    pub index: usize,

    pub tests: Vec<Test>,

    /// Summed weight of the tests when balancing by timing
    #[serde(
        rename = "estimated_ns",
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_estimate"
    )]
    pub estimated: Option<Duration>,
}

fn serialize_estimate<S: serde::Serializer>(
    estimate: &Option<Duration>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match estimate {
        Some(duration) => crate::timing::nanos::serialize(duration, serializer),
        None => serializer.serialize_none(),
    }
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}

/// An exact partition of a test set
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Partition {
    chunks: Vec<Chunk>,
}

impl Partition {
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Take the chunk addressed by `spec`
    pub fn into_chunk(mut self, spec: ChunkSpec) -> Chunk {
        self.chunks.swap_remove(spec.index())
    }
}

/// How tests are distributed over chunks
#[derive(Clone, Debug, Default)]
pub enum Strategy {
    /// Equal-size contiguous ranges of the sorted tests
    #[default]
    Equal,

    /// Greedy balancing on averaged durations
    Weighted {
        timings: TimingTable,
        default_weight: Duration,
    },
}

/// Computes chunk assignments
#[derive(Clone, Debug, Default)]
pub struct Partitioner {
    strategy: Strategy,
}

impl Partitioner {
    pub fn equal() -> Self {
        Self {
            strategy: Strategy::Equal,
        }
    }

    pub fn weighted(timings: TimingTable) -> Self {
        Self {
            strategy: Strategy::Weighted {
                timings,
                default_weight: DEFAULT_WEIGHT,
            },
        }
    }

    /// Use weighted balancing when timings are available
    pub fn from_timings(timings: Option<TimingTable>) -> Self {
        timings.map(Self::weighted).unwrap_or_default()
    }

    /// Weight of tests without timing data; zero is ignored
    pub fn with_default_weight(mut self, weight: Duration) -> Self {
        if let Strategy::Weighted { default_weight, .. } = &mut self.strategy {
            if !weight.is_zero() {
                *default_weight = weight;
            }
        }
        self
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    /// Split `tests` into `total` chunks
    pub fn partition(&self, tests: &[Test], total: usize) -> Result<Partition> {
        if total < 1 {
            return Err(ChunkError::PartitionBounds {
                index: 0,
                total: total as i64,
            });
        }

        let sorted = canonical(tests);
        let chunks = match &self.strategy {
            Strategy::Equal => equal::split(&sorted, total)
                .into_iter()
                .enumerate()
                .map(|(index, tests)| Chunk {
                    index,
                    tests,
                    estimated: None,
                })
                .collect(),
            Strategy::Weighted {
                timings,
                default_weight,
            } => weighted::balance(&sorted, total, |test| {
                timings.weight_of(test, *default_weight)
            })
            .into_iter()
            .enumerate()
            .map(|(index, (tests, load))| Chunk {
                index,
                tests,
                estimated: Some(load),
            })
            .collect(),
        };

        let partition = Partition { chunks };
        debug!(
            "Partitioned {} tests into {} chunks: {:?}",
            sorted.len(),
            total,
            partition.chunks.iter().map(Chunk::len).collect::<Vec<_>>()
        );
        Ok(partition)
    }

    /// The tests of a single chunk
    pub fn chunk(&self, tests: &[Test], spec: ChunkSpec) -> Result<Chunk> {
        Ok(self.partition(tests, spec.total())?.into_chunk(spec))
    }
}

/// Tests in canonical order with duplicates removed
fn canonical(tests: &[Test]) -> Vec<Test> {
    let mut sorted = tests.to_vec();
    sorted.sort();
    sorted.dedup();
    sorted
}
