//! Historical test timings
//!
//! Loads averaged durations that weight the balancing partitioner and
//! records the durations observed in the current run.

mod collector;
pub mod nanos;
mod store;

pub use collector::TimingCollector;
pub use store::{
    load_files, load_pattern, read_records, write_records, TimingRecord, TimingStore,
    TimingTable, DEFAULT_WEIGHT,
};
