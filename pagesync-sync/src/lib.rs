//! # pagesync-sync
//!
//! Fans one document out to many backends and reconciles what comes back.
//!
//! Call [`Orchestrator::sync`] to run create → update → delete → read across
//! every [`DocumentAdapter`], or [`Orchestrator::reconcile`] to run only the
//! read phase. Both return a [`SyncReport`] with per-backend outcomes and the
//! most recent replica.

pub mod adapter;
pub mod error;
pub mod orchestrator;
pub mod report;

pub use adapter::{AdapterError, CallContext, DocumentAdapter, MockAdapter};
pub use error::SyncError;
pub use orchestrator::{Orchestrator, SyncOptions};
pub use report::{
    select_latest, FailureKind, OperationOutcome, PhaseFailure, Selected, SyncReport,
};
pub use tokio_util::sync::CancellationToken;
