//! Four-phase fan-out across every adapter, barrier-synchronized per phase.
//!
//! ```text
//! create ──barrier──▶ update ──barrier──▶ delete ──barrier──▶ read ──▶ select
//! ```
//!
//! Each phase spawns one task per adapter and awaits all of them before the
//! next phase starts. Workers never touch the result maps; they send a
//! [`PhaseEvent`] to a single aggregator task that owns the maps for the
//! whole run.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use pagesync_core::{BackendName, Document, DocumentId, Phase};

use crate::adapter::{AdapterError, CallContext, DocumentAdapter};
use crate::error::SyncError;
use crate::report::{
    select_latest, FailureKind, OperationOutcome, PhaseFailure, Selected, SyncReport,
};

/// Knobs for a run. The default matches the unbounded, non-retrying protocol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Deadline applied to every individual adapter call.
    pub call_timeout: Option<Duration>,
}

/// Stateless driver of the synchronization protocol.
///
/// Holds only immutable options, so one instance can serve concurrent runs.
#[derive(Debug, Clone, Default)]
pub struct Orchestrator {
    options: SyncOptions,
}

impl Orchestrator {
    pub fn new(options: SyncOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Push `document` through create, update, delete and read on every
    /// adapter, then select the most recent replica.
    ///
    /// Backend failures are recorded in the report; only an unusable adapter
    /// set returns `Err`.
    pub async fn sync(
        &self,
        document: &Document,
        adapters: &[Arc<dyn DocumentAdapter>],
    ) -> Result<SyncReport, SyncError> {
        self.sync_with_cancel(document, adapters, CancellationToken::new())
            .await
    }

    /// [`sync`](Self::sync) with an external cancellation signal. Once
    /// cancelled, in-flight calls are abandoned and remaining calls are
    /// recorded as cancelled; a full report is still returned.
    pub async fn sync_with_cancel(
        &self,
        document: &Document,
        adapters: &[Arc<dyn DocumentAdapter>],
        cancel: CancellationToken,
    ) -> Result<SyncReport, SyncError> {
        let document = Arc::new(document.clone());
        self.run(
            document.id.clone(),
            &[
                Request::Create(document.clone()),
                Request::Update(document.clone()),
                Request::Delete(document.id.clone()),
                Request::Read(document.id.clone()),
            ],
            adapters,
            cancel,
        )
        .await
    }

    /// Read `id` from every adapter and select the most recent replica,
    /// without writing anything.
    pub async fn reconcile(
        &self,
        id: &DocumentId,
        adapters: &[Arc<dyn DocumentAdapter>],
    ) -> Result<SyncReport, SyncError> {
        self.reconcile_with_cancel(id, adapters, CancellationToken::new())
            .await
    }

    pub async fn reconcile_with_cancel(
        &self,
        id: &DocumentId,
        adapters: &[Arc<dyn DocumentAdapter>],
        cancel: CancellationToken,
    ) -> Result<SyncReport, SyncError> {
        self.run(id.clone(), &[Request::Read(id.clone())], adapters, cancel)
            .await
    }

    async fn run(
        &self,
        document_id: DocumentId,
        plan: &[Request],
        adapters: &[Arc<dyn DocumentAdapter>],
        cancel: CancellationToken,
    ) -> Result<SyncReport, SyncError> {
        check_preconditions(adapters)?;
        if adapters.is_empty() {
            tracing::info!(document = %document_id, "no adapters supplied; nothing to sync");
            return Ok(SyncReport::empty(document_id));
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel::<PhaseEvent>();
        let aggregator = tokio::spawn(aggregate(events_rx));

        for request in plan {
            self.run_phase(request, adapters, &events_tx, &cancel).await;
        }
        drop(events_tx);

        let outcomes = aggregator
            .await
            .map_err(|err| SyncError::Aggregator(err.to_string()))?;

        let mut backends: Vec<BackendName> = adapters.iter().map(|a| a.name().clone()).collect();
        backends.sort();
        Ok(outcomes.into_report(document_id, backends))
    }

    /// Fan `request` out to every adapter and wait for all of them.
    async fn run_phase(
        &self,
        request: &Request,
        adapters: &[Arc<dyn DocumentAdapter>],
        events: &mpsc::UnboundedSender<PhaseEvent>,
        cancel: &CancellationToken,
    ) {
        let phase = request.phase();
        let started = Instant::now();
        tracing::debug!(%phase, adapters = adapters.len(), "phase started");

        let workers: Vec<(BackendName, JoinHandle<()>)> = adapters
            .iter()
            .map(|adapter| {
                let backend = adapter.name().clone();
                let adapter = Arc::clone(adapter);
                let request = request.clone();
                let events = events.clone();
                let ctx = CallContext::new(
                    self.options
                        .call_timeout
                        .and_then(|t| Instant::now().checked_add(t)),
                    cancel.clone(),
                );
                let handle = tokio::spawn(async move {
                    let result = ctx.bound(request.send(adapter.as_ref(), &ctx)).await;
                    let _ = events.send(PhaseEvent {
                        backend: adapter.name().clone(),
                        phase: request.phase(),
                        result: result.map_err(Failure::from),
                    });
                });
                (backend, handle)
            })
            .collect();

        // Barrier: every worker terminates before the next phase is issued.
        for (backend, handle) in workers {
            if let Err(err) = handle.await {
                let _ = events.send(PhaseEvent {
                    backend,
                    phase,
                    result: Err(Failure {
                        kind: FailureKind::Panicked,
                        message: format!("worker task failed: {err}"),
                    }),
                });
            }
        }

        tracing::debug!(
            %phase,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "phase complete",
        );
    }
}

/// Two adapters sharing a label would collapse into one report entry.
fn check_preconditions(adapters: &[Arc<dyn DocumentAdapter>]) -> Result<(), SyncError> {
    let mut seen = HashSet::new();
    for adapter in adapters {
        if !seen.insert(adapter.name()) {
            return Err(SyncError::PreconditionViolation(format!(
                "backend name '{}' is used by more than one adapter",
                adapter.name()
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Phase requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Request {
    Create(Arc<Document>),
    Update(Arc<Document>),
    Delete(DocumentId),
    Read(DocumentId),
}

impl Request {
    fn phase(&self) -> Phase {
        match self {
            Request::Create(_) => Phase::Create,
            Request::Update(_) => Phase::Update,
            Request::Delete(_) => Phase::Delete,
            Request::Read(_) => Phase::Read,
        }
    }

    async fn send(
        &self,
        adapter: &dyn DocumentAdapter,
        ctx: &CallContext,
    ) -> Result<Response, AdapterError> {
        match self {
            Request::Create(doc) => adapter.create(ctx, doc).await.map(Response::Created),
            Request::Update(doc) => adapter.update(ctx, doc).await.map(|()| Response::Done),
            Request::Delete(id) => adapter.delete(ctx, id).await.map(|()| Response::Done),
            Request::Read(id) => adapter.read(ctx, id).await.map(Response::Fetched),
        }
    }
}

#[derive(Debug)]
enum Response {
    Created(String),
    Done,
    Fetched(Document),
}

#[derive(Debug)]
struct Failure {
    kind: FailureKind,
    message: String,
}

impl From<AdapterError> for Failure {
    fn from(err: AdapterError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// What a worker reports back to the aggregator.
#[derive(Debug)]
struct PhaseEvent {
    backend: BackendName,
    phase: Phase,
    result: Result<Response, Failure>,
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Outcomes {
    reads: BTreeMap<BackendName, OperationOutcome>,
    failures: BTreeMap<BackendName, Vec<PhaseFailure>>,
    created_ids: BTreeMap<BackendName, String>,
}

/// Sole owner of the result maps for one run.
async fn aggregate(mut events: mpsc::UnboundedReceiver<PhaseEvent>) -> Outcomes {
    let mut outcomes = Outcomes::default();
    while let Some(event) = events.recv().await {
        outcomes.record(event);
    }
    outcomes
}

impl Outcomes {
    fn record(&mut self, event: PhaseEvent) {
        let PhaseEvent {
            backend,
            phase,
            result,
        } = event;
        match result {
            Ok(Response::Created(backend_id)) => {
                self.created_ids.insert(backend, backend_id);
            }
            Ok(Response::Done) => {}
            Ok(Response::Fetched(document)) => {
                self.reads.insert(
                    backend,
                    OperationOutcome::Success {
                        document: Some(document),
                    },
                );
            }
            Err(Failure { kind, message }) => {
                tracing::warn!(
                    backend = %backend,
                    %phase,
                    %kind,
                    error = %message,
                    "backend call failed",
                );
                if phase == Phase::Read {
                    self.reads.insert(
                        backend.clone(),
                        OperationOutcome::Failure {
                            kind,
                            message: message.clone(),
                        },
                    );
                }
                self.failures
                    .entry(backend.clone())
                    .or_default()
                    .push(PhaseFailure {
                        backend,
                        phase,
                        kind,
                        message,
                    });
            }
        }
    }

    fn into_report(self, document_id: DocumentId, backends: Vec<BackendName>) -> SyncReport {
        let selected = select_latest(
            self.reads
                .iter()
                .filter_map(|(backend, outcome)| outcome.document().map(|doc| (backend, doc))),
        );
        log_selection(&document_id, selected.as_ref());

        SyncReport {
            document_id,
            backends,
            reads: self.reads,
            failures: self.failures,
            created_ids: self.created_ids,
            selected,
        }
    }
}

fn log_selection(document_id: &DocumentId, selected: Option<&Selected>) {
    match selected {
        Some(selected) => tracing::info!(
            document = %document_id,
            backend = %selected.backend,
            timestamp = %selected.document.timestamp.to_rfc3339(),
            "most recent version selected",
        ),
        None => tracing::info!(
            document = %document_id,
            "no backend returned the document",
        ),
    }
}
