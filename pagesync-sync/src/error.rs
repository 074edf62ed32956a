//! Error types for pagesync-sync.
//!
//! Backend failures never surface here; they are recorded in the
//! [`SyncReport`](crate::SyncReport). Only invalid calls abort a run.

use thiserror::Error;

/// Errors that abort a synchronization run outright.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The adapter set handed to the orchestrator cannot produce an
    /// unambiguous report.
    #[error("precondition violated: {0}")]
    PreconditionViolation(String),

    /// The task owning the result maps did not finish.
    #[error("aggregator task failed: {0}")]
    Aggregator(String),
}
