//! Event observers
//!
//! Observers receive every decoded event in emission order. They compose by
//! registration order on the runner, and any failure aborts the stream.

#![allow(dead_code)]

use std::fmt;
use std::io::Write;
use tracing::warn;

use crate::models::{Action, Test, TestEvent};

/// Receives decoded test events
pub trait EventObserver: Send {
    /// Name used when reporting a failure of this observer
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Handle one event; an error stops the run
    fn handle(&mut self, event: &TestEvent) -> anyhow::Result<()>;
}

/// Tallies test-level outcomes
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,

    /// Failed tests in the order they were reported
    pub failures: Vec<Test>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped
    }

    /// Percentage of finished tests that passed
    pub fn pass_rate(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            (self.passed as f64 / self.total() as f64) * 100.0
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

impl EventObserver for RunSummary {
    fn name(&self) -> &'static str {
        "run summary"
    }

    fn handle(&mut self, event: &TestEvent) -> anyhow::Result<()> {
        if !event.is_test_level() {
            return Ok(());
        }

        match event.action {
            Action::Pass => self.passed += 1,
            Action::Skip => self.skipped += 1,
            Action::Fail => {
                warn!("FAIL {}.{} ({:.2}s)", event.package, event.test, event.elapsed);
                self.failed += 1;
                self.failures.push(Test::new(&event.package, &event.test));
            }
            _ => {}
        }
        Ok(())
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} passed, {} failed, {} skipped ({:.1}%)",
            self.passed,
            self.failed,
            self.skipped,
            self.pass_rate()
        )
    }
}

/// Writes the human-readable output carried by events
pub struct OutputEcho<W> {
    writer: W,
}

impl<W: Write + Send> OutputEcho<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> EventObserver for OutputEcho<W> {
    fn name(&self) -> &'static str {
        "output echo"
    }

    fn handle(&mut self, event: &TestEvent) -> anyhow::Result<()> {
        if event.output.is_empty() {
            return Ok(());
        }
        self.writer.write_all(event.output.as_bytes())?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(action: Action, test: &str) -> TestEvent {
        TestEvent::new(action, "pkg", test)
    }

    #[test]
    fn test_summary_counts_test_level_outcomes() {
        let mut summary = RunSummary::new();
        let events = vec![
            event(Action::Run, "TestA"),
            event(Action::Pass, "TestA"),
            event(Action::Fail, "TestB"),
            event(Action::Skip, "TestC"),
            event(Action::Fail, "TestD"),
            // package result
            event(Action::Fail, ""),
        ];
        for e in &events {
            summary.handle(e).unwrap();
        }

        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(
            summary.failures,
            vec![Test::new("pkg", "TestB"), Test::new("pkg", "TestD")]
        );
        assert!(!summary.is_success());
        assert_eq!(summary.to_string(), "1 passed, 2 failed, 1 skipped (25.0%)");
    }

    #[test]
    fn test_empty_summary() {
        let summary = RunSummary::new();
        assert_eq!(summary.pass_rate(), 0.0);
        assert!(summary.is_success());
    }

    #[test]
    fn test_echo_writes_output_only() {
        let mut echo = OutputEcho::new(Vec::new());
        echo.handle(&event(Action::Run, "TestA")).unwrap();
        echo.handle(&event(Action::Output, "TestA").with_output("=== RUN   TestA\n"))
            .unwrap();
        echo.handle(&event(Action::Output, "TestA").with_output("--- PASS: TestA\n"))
            .unwrap();

        assert_eq!(
            String::from_utf8(echo.into_inner()).unwrap(),
            "=== RUN   TestA\n--- PASS: TestA\n"
        );
    }

    #[test]
    fn test_default_name_is_type_name() {
        struct Silent;
        impl EventObserver for Silent {
            fn handle(&mut self, _event: &TestEvent) -> anyhow::Result<()> {
                Ok(())
            }
        }
        assert!(Silent.name().ends_with("Silent"));
    }
}
