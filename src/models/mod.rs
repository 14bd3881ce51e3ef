//! Data models for test chunking
//!
//! Test identities and the structured events emitted while tests run.

mod event;

pub use event::{Action, TestEvent};
pub use test::{Test, ROOT_PACKAGE};
