//! Timing collection from test events

use std::time::Duration;

use super::TimingRecord;
use crate::catalog::normalize_package;
use crate::executor::EventObserver;
use crate::models::{Action, TestEvent};

/// Records the elapsed time of every passing test
#[derive(Debug, Default)]
pub struct TimingCollector {
    module: String,
    records: Vec<TimingRecord>,
}

impl TimingCollector {
    /// Create a collector that stores packages relative to `module`
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            records: Vec::new(),
        }
    }

    pub fn records(&self) -> &[TimingRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<TimingRecord> {
        self.records
    }
}

impl EventObserver for TimingCollector {
    fn name(&self) -> &'static str {
        "timing collector"
    }

    fn handle(&mut self, event: &TestEvent) -> anyhow::Result<()> {
        if event.action != Action::Pass || !event.is_test_level() || event.elapsed <= 0.0 {
            return Ok(());
        }

        let time = Duration::try_from_secs_f64(event.elapsed)
            .map_err(|e| anyhow::anyhow!("invalid elapsed time {} for {}: {e}", event.elapsed, event.test))?;

        self.records.push(TimingRecord::new(
            normalize_package(&self.module, &event.package),
            &event.test,
            time,
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODULE: &str = "github.com/acme/widgets";

    fn pass(test: &str, elapsed: f64) -> TestEvent {
        TestEvent::new(Action::Pass, format!("{MODULE}/pkg/example"), test).with_elapsed(elapsed)
    }

    #[test]
    fn test_records_passing_tests_with_relative_packages() {
        let mut collector = TimingCollector::new(MODULE);
        collector.handle(&pass("TestSimple", 0.5)).unwrap();

        assert_eq!(
            collector.records(),
            &[TimingRecord::new(
                "pkg/example",
                "TestSimple",
                Duration::from_millis(500)
            )]
        );
    }

    #[test]
    fn test_ignores_other_events() {
        let mut collector = TimingCollector::new(MODULE);
        let events = vec![
            TestEvent::new(Action::Run, "pkg", "TestSimple"),
            TestEvent::new(Action::Fail, "pkg", "TestBroken").with_elapsed(1.0),
            TestEvent::new(Action::Skip, "pkg", "TestSkipped").with_elapsed(0.1),
            // package-level pass
            TestEvent::new(Action::Pass, "pkg", "").with_elapsed(2.0),
            // too fast to register
            pass("TestInstant", 0.0),
        ];
        for event in &events {
            collector.handle(event).unwrap();
        }

        assert!(collector.into_records().is_empty());
    }

    #[test]
    fn test_subtests_keep_their_own_identity() {
        let mut collector = TimingCollector::new(MODULE);
        collector.handle(&pass("TestMath/Divide", 0.2)).unwrap();
        collector.handle(&pass("TestMath", 0.3)).unwrap();

        let tests: Vec<&str> = collector.records().iter().map(|r| r.test.as_str()).collect();
        assert_eq!(tests, vec!["TestMath/Divide", "TestMath"]);
    }

    #[test]
    fn test_rejects_unrepresentable_elapsed() {
        let mut collector = TimingCollector::new(MODULE);
        assert!(collector.handle(&pass("TestForever", f64::INFINITY)).is_err());
    }
}
