//! Test execution
//!
//! Assembles the `go test` invocation for a chunk and runs it through the
//! [`EventStreamRunner`], which decodes the structured output and hands
//! every event to the registered observers.

mod command;
mod observer;
mod runner;

pub use command::{run_selector, selector_from_qualified, TestCommand};
pub use observer::{EventObserver, OutputEcho, RunSummary};
pub use runner::{EventStreamRunner, RunReport};
