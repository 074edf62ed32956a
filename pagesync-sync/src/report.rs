//! Per-backend outcomes and the version-selection policy.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use pagesync_core::{BackendName, Document, DocumentId, Phase};

/// Coarse classification of a recorded failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The backend rejected the call or could not be reached.
    Adapter,
    /// The backend answered with something that is not a document.
    MalformedResponse,
    Timeout,
    Cancelled,
    /// The worker task for this call panicked.
    Panicked,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Adapter => write!(f, "adapter"),
            FailureKind::MalformedResponse => write!(f, "malformed_response"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Cancelled => write!(f, "cancelled"),
            FailureKind::Panicked => write!(f, "panicked"),
        }
    }
}

/// Result of one operation against one backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OperationOutcome {
    Success { document: Option<Document> },
    Failure { kind: FailureKind, message: String },
}

impl OperationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, OperationOutcome::Success { .. })
    }

    pub fn document(&self) -> Option<&Document> {
        match self {
            OperationOutcome::Success { document } => document.as_ref(),
            OperationOutcome::Failure { .. } => None,
        }
    }
}

/// A failure recorded against one backend in one phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseFailure {
    pub backend: BackendName,
    pub phase: Phase,
    pub kind: FailureKind,
    pub message: String,
}

impl fmt::Display for PhaseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed {} ({}): {}",
            self.backend, self.phase, self.kind, self.message
        )
    }
}

/// The document chosen as authoritative, with the backend it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selected {
    pub backend: BackendName,
    pub document: Document,
}

/// Everything one run learned, keyed by backend.
///
/// Maps are ordered by backend name so that two runs over the same adapters
/// render identically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub document_id: DocumentId,
    /// Every backend that took part, ascending.
    pub backends: Vec<BackendName>,
    /// Read-phase outcome per backend.
    pub reads: BTreeMap<BackendName, OperationOutcome>,
    /// Every failure per backend, across all phases, in phase order.
    pub failures: BTreeMap<BackendName, Vec<PhaseFailure>>,
    /// Backend-local identities returned by Create. Reporting only: later
    /// phases always address the caller's `document_id`.
    pub created_ids: BTreeMap<BackendName, String>,
    pub selected: Option<Selected>,
}

impl SyncReport {
    /// Report for a run that touched no backend.
    pub fn empty(document_id: DocumentId) -> Self {
        Self {
            document_id,
            backends: Vec::new(),
            reads: BTreeMap::new(),
            failures: BTreeMap::new(),
            created_ids: BTreeMap::new(),
            selected: None,
        }
    }

    pub fn successful_reads(&self) -> impl Iterator<Item = (&BackendName, &Document)> {
        self.reads
            .iter()
            .filter_map(|(backend, outcome)| outcome.document().map(|doc| (backend, doc)))
    }

    pub fn failures_in(&self, phase: Phase) -> impl Iterator<Item = &PhaseFailure> {
        self.failures
            .values()
            .flatten()
            .filter(move |failure| failure.phase == phase)
    }

    pub fn failed_backends(&self) -> BTreeSet<&BackendName> {
        self.failures.keys().collect()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.values().map(Vec::len).sum()
    }

    /// No backend failed any phase.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Pick the document with the latest timestamp.
///
/// Equal latest timestamps resolve to the greatest backend name, independent
/// of iteration order. No candidates means no selection.
pub fn select_latest<'a, I>(candidates: I) -> Option<Selected>
where
    I: IntoIterator<Item = (&'a BackendName, &'a Document)>,
{
    candidates
        .into_iter()
        .max_by(|(a_name, a_doc), (b_name, b_doc)| {
            a_doc
                .timestamp
                .cmp(&b_doc.timestamp)
                .then_with(|| a_name.cmp(b_name))
        })
        .map(|(backend, document)| Selected {
            backend: backend.clone(),
            document: document.clone(),
        })
}
