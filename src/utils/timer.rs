//! Phase timing
//!
//! Measures how long discovery, partitioning and the test run take so a
//! slow CI slot can be traced to the phase responsible.

#![allow(dead_code)]

use std::fmt;
use std::time::{Duration, Instant};
use tracing::debug;

/// Records the duration of consecutive named phases
#[derive(Debug)]
pub struct PhaseTimer {
    start: Instant,
    last: Instant,
    phases: Vec<(&'static str, Duration)>,
}

impl PhaseTimer {
    pub fn start() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last: now,
            phases: Vec::new(),
        }
    }

    /// Close the current phase under `label` and start the next one
    pub fn finish(&mut self, label: &'static str) -> Duration {
        let now = Instant::now();
        let elapsed = now - self.last;
        self.last = now;
        self.phases.push((label, elapsed));
        debug!("{}: {}ms", label, elapsed.as_millis());
        elapsed
    }

    pub fn phases(&self) -> &[(&'static str, Duration)] {
        &self.phases
    }

    pub fn total(&self) -> Duration {
        self.start.elapsed()
    }
}

impl fmt::Display for PhaseTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (label, duration) in &self.phases {
            write!(f, "{}: {}ms, ", label, duration.as_millis())?;
        }
        write!(f, "total: {}ms", self.total().as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_phases_are_not_cumulative() {
        let mut timer = PhaseTimer::start();
        sleep(Duration::from_millis(10));
        let first = timer.finish("discovery");
        sleep(Duration::from_millis(10));
        let second = timer.finish("partition");

        assert!(first >= Duration::from_millis(10));
        assert!(second >= Duration::from_millis(10));
        assert!(timer.total() >= first + second);
        assert_eq!(timer.phases().len(), 2);
    }

    #[test]
    fn test_display_lists_phases() {
        let mut timer = PhaseTimer::start();
        timer.finish("discovery");
        let text = timer.to_string();
        assert!(text.starts_with("discovery: "));
        assert!(text.contains("total: "));
    }
}
