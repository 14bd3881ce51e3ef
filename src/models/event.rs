//! Structured test events
//!
//! One event per line of `go test -json` output.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Event action
///
/// Actions the tool does not know about are kept verbatim in
/// [`Action::Other`] so observers still see them.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Action {
    Start,
    Run,
    Pause,
    Cont,
    Pass,
    Fail,
    Skip,
    Output,
    Bench,
    Other(String),
}

impl Action {
    pub fn as_str(&self) -> &str {
        match self {
            Action::Start => "start",
            Action::Run => "run",
            Action::Pause => "pause",
            Action::Cont => "cont",
            Action::Pass => "pass",
            Action::Fail => "fail",
            Action::Skip => "skip",
            Action::Output => "output",
            Action::Bench => "bench",
            Action::Other(action) => action,
        }
    }

    /// Whether the action ends a test or package
    pub fn is_terminal(&self) -> bool {
        matches!(self, Action::Pass | Action::Fail | Action::Skip)
    }
}

impl From<String> for Action {
    fn from(action: String) -> Self {
        match action.as_str() {
            "start" => Action::Start,
            "run" => Action::Run,
            "pause" => Action::Pause,
            "cont" => Action::Cont,
            "pass" => Action::Pass,
            "fail" => Action::Fail,
            "skip" => Action::Skip,
            "output" => Action::Output,
            "bench" => Action::Bench,
            _ => Action::Other(action),
        }
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        match action {
            Action::Other(action) => action,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single structured test event
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestEvent {
    #[serde(rename = "Time", default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,

    #[serde(rename = "Action")]
    pub action: Action,

    #[serde(rename = "Package", default, skip_serializing_if = "String::is_empty")]
    pub package: String,

    #[serde(rename = "Test", default, skip_serializing_if = "String::is_empty")]
    pub test: String,

    /// Seconds, zero when not reported
    #[serde(rename = "Elapsed", default, skip_serializing_if = "is_zero")]
    pub elapsed: f64,

    #[serde(rename = "Output", default, skip_serializing_if = "String::is_empty")]
    pub output: String,
}

fn is_zero(value: &f64) -> bool {
    *value == 0.0
}

impl TestEvent {
    pub fn new(action: Action, package: impl Into<String>, test: impl Into<String>) -> Self {
        Self {
            time: None,
            action,
            package: package.into(),
            test: test.into(),
            elapsed: 0.0,
            output: String::new(),
        }
    }

    pub fn with_elapsed(mut self, seconds: f64) -> Self {
        self.elapsed = seconds;
        self
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    /// Whether the event concerns a single test rather than a whole package
    pub fn is_test_level(&self) -> bool {
        !self.test.is_empty()
    }
}
