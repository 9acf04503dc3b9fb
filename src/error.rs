//! Typed errors for form compilation and job execution.
//!
//! Startup and I/O paths use `anyhow`; these enums exist where callers need
//! to branch on the kind of failure (the HTTP layer maps each variant to a
//! status code).

use chrono::{DateTime, Utc};
use thiserror::Error;

/// The submitted form could not be compiled into a directive.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} must be an integer, got {value:?}")]
    NotAnInteger { field: &'static str, value: String },
}

/// A job could not be run to completion.
#[derive(Debug, Error)]
pub enum JobError {
    /// Another job holds the single-flight slot.
    #[error("a crawl job is already running (started {started_at})")]
    AlreadyRunning { started_at: DateTime<Utc> },

    /// The crawl engine failed to start or exited abnormally.
    #[error("crawl engine failed: {0:#}")]
    Engine(anyhow::Error),

    /// The blocking worker running the engine panicked or was cancelled.
    #[error("crawl worker aborted: {0}")]
    Worker(String),
}
