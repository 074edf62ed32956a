//! The document capability every backend implements.
//!
//! An adapter owns everything vendor-specific (authentication, URLs, payload
//! mapping). The orchestrator only ever sees this trait.

mod mock;

pub use mock::{MockAdapter, MockEdge, MockEvent, MockEventLog};

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use pagesync_core::{BackendName, Document, DocumentId};

use crate::report::FailureKind;

/// Errors an adapter may return from any operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    /// The backend answered with an unexpected status code.
    #[error("unexpected status {status}: {message}")]
    Status { status: u16, message: String },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("document '{0}' not found")]
    NotFound(DocumentId),

    #[error("document '{0}' already exists")]
    Conflict(DocumentId),

    /// The identity cannot address a resource on this backend.
    #[error("invalid document identity '{0}'")]
    InvalidIdentity(String),

    /// The backend answered, but not with something that reads as a document.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("deadline exceeded")]
    Timeout,

    #[error("cancelled")]
    Cancelled,
}

impl AdapterError {
    pub fn kind(&self) -> FailureKind {
        match self {
            AdapterError::MalformedResponse(_) => FailureKind::MalformedResponse,
            AdapterError::Timeout => FailureKind::Timeout,
            AdapterError::Cancelled => FailureKind::Cancelled,
            AdapterError::Status { .. }
            | AdapterError::Transport(_)
            | AdapterError::NotFound(_)
            | AdapterError::Conflict(_)
            | AdapterError::InvalidIdentity(_)
            | AdapterError::Io(_) => FailureKind::Adapter,
        }
    }
}

/// Per-call deadline and cancellation signal handed to every adapter operation.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl CallContext {
    pub fn new(deadline: Option<Instant>, cancel: CancellationToken) -> Self {
        Self { deadline, cancel }
    }

    /// No deadline, never cancelled.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// A timeout too large to represent as an instant means no deadline.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(Instant::now().checked_add(timeout), CancellationToken::new())
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline; `Some(ZERO)` once it has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the run is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Drive `call` until it finishes, the deadline passes, or the run is
    /// cancelled. An abandoned call is dropped mid-flight.
    pub async fn bound<T, F>(&self, call: F) -> Result<T, AdapterError>
    where
        F: Future<Output = Result<T, AdapterError>>,
    {
        if self.is_cancelled() {
            return Err(AdapterError::Cancelled);
        }
        let deadline = async {
            match self.deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AdapterError::Cancelled),
            _ = deadline => Err(AdapterError::Timeout),
            result = call => result,
        }
    }
}

/// Create/Update/Delete/Read against one backend.
///
/// Implementations must be safe to call concurrently; the orchestrator issues
/// one call per phase per adapter, each from its own task.
#[async_trait]
pub trait DocumentAdapter: Send + Sync {
    /// Reporting label, fixed at construction.
    fn name(&self) -> &BackendName;

    /// Create the document; returns the backend-local identity.
    async fn create(&self, ctx: &CallContext, doc: &Document) -> Result<String, AdapterError>;

    async fn update(&self, ctx: &CallContext, doc: &Document) -> Result<(), AdapterError>;

    async fn delete(&self, ctx: &CallContext, id: &DocumentId) -> Result<(), AdapterError>;

    async fn read(&self, ctx: &CallContext, id: &DocumentId) -> Result<Document, AdapterError>;
}
