//! Test harness utilities for the server suites.

mod client;
mod reporter;

pub use client::AgentClient;
pub use reporter::{HubEvent, RecordingHubReporter};
