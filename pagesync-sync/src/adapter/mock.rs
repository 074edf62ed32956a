//! Mock adapter for testing.
//!
//! Allows scripting per-phase failures, latency, hangs and panics, and records
//! every call for verification.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use pagesync_core::{BackendName, Document, DocumentId, Phase};

use super::{AdapterError, CallContext, DocumentAdapter};

/// Whether a logged call was starting or finishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockEdge {
    Started,
    Finished,
}

/// One entry of a [`MockEventLog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockEvent {
    pub backend: BackendName,
    pub phase: Phase,
    pub edge: MockEdge,
    pub at: Instant,
}

/// Ordered call log that several mocks can share.
#[derive(Debug, Clone, Default)]
pub struct MockEventLog {
    events: Arc<Mutex<Vec<MockEvent>>>,
}

impl MockEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MockEvent> {
        lock(&self.events).clone()
    }

    fn push(&self, backend: &BackendName, phase: Phase, edge: MockEdge) {
        lock(&self.events).push(MockEvent {
            backend: backend.clone(),
            phase,
            edge,
            at: Instant::now(),
        });
    }
}

/// Scriptable [`DocumentAdapter`].
///
/// By default every call succeeds: create returns `"<name>:<id>"`, read
/// returns the last document written by create/update (or `NotFound`).
/// Clones share scripted behaviour and recorded calls.
#[derive(Debug, Clone)]
pub struct MockAdapter {
    name: BackendName,
    inner: Arc<Mutex<MockAdapterInner>>,
    log: Option<MockEventLog>,
}

#[derive(Debug, Default)]
struct MockAdapterInner {
    failures: HashMap<Phase, AdapterError>,
    latency: HashMap<Phase, Duration>,
    hangs: HashSet<Phase>,
    panics: HashSet<Phase>,
    read_fixture: Option<Document>,
    last_written: Option<Document>,
    calls: Vec<(Phase, DocumentId)>,
}

impl MockAdapter {
    /// Create a mock that succeeds at every phase.
    pub fn new(name: impl Into<BackendName>) -> Self {
        Self {
            name: name.into(),
            inner: Arc::default(),
            log: None,
        }
    }

    /// Make every call of `phase` fail with `error`.
    pub fn failing(self, phase: Phase, error: AdapterError) -> Self {
        self.lock().failures.insert(phase, error);
        self
    }

    /// Delay every call of `phase` by `latency` before answering.
    pub fn with_latency(self, phase: Phase, latency: Duration) -> Self {
        self.lock().latency.insert(phase, latency);
        self
    }

    /// Never answer calls of `phase`.
    pub fn hanging(self, phase: Phase) -> Self {
        self.lock().hangs.insert(phase);
        self
    }

    /// Panic inside calls of `phase`.
    pub fn panicking(self, phase: Phase) -> Self {
        self.lock().panics.insert(phase);
        self
    }

    /// Answer reads with `doc` regardless of what was written.
    pub fn reading(self, doc: Document) -> Self {
        self.lock().read_fixture = Some(doc);
        self
    }

    /// Record start/finish of every call into a shared log.
    pub fn logging_to(mut self, log: &MockEventLog) -> Self {
        self.log = Some(log.clone());
        self
    }

    /// Every call received so far, in arrival order.
    pub fn calls(&self) -> Vec<(Phase, DocumentId)> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, phase: Phase) -> usize {
        self.lock().calls.iter().filter(|(p, _)| *p == phase).count()
    }

    fn lock(&self) -> MutexGuard<'_, MockAdapterInner> {
        lock(&self.inner)
    }

    /// Shared prologue of every operation: log, record, wait, then apply the
    /// scripted failure if any. The lock is never held across an await.
    async fn enter(&self, phase: Phase, id: &DocumentId) -> Result<(), AdapterError> {
        if let Some(log) = &self.log {
            log.push(&self.name, phase, MockEdge::Started);
        }
        let (latency, hang, panic, failure) = {
            let mut inner = self.lock();
            inner.calls.push((phase, id.clone()));
            (
                inner.latency.get(&phase).copied(),
                inner.hangs.contains(&phase),
                inner.panics.contains(&phase),
                inner.failures.get(&phase).cloned(),
            )
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if hang {
            std::future::pending::<()>().await;
        }
        if panic {
            panic!("mock adapter '{}' scripted to panic in {phase}", self.name);
        }
        let result = match failure {
            Some(err) => Err(err),
            None => Ok(()),
        };
        if let Some(log) = &self.log {
            log.push(&self.name, phase, MockEdge::Finished);
        }
        result
    }
}

#[async_trait]
impl DocumentAdapter for MockAdapter {
    fn name(&self) -> &BackendName {
        &self.name
    }

    async fn create(&self, _ctx: &CallContext, doc: &Document) -> Result<String, AdapterError> {
        self.enter(Phase::Create, &doc.id).await?;
        self.lock().last_written = Some(doc.clone());
        Ok(format!("{}:{}", self.name, doc.id))
    }

    async fn update(&self, _ctx: &CallContext, doc: &Document) -> Result<(), AdapterError> {
        self.enter(Phase::Update, &doc.id).await?;
        self.lock().last_written = Some(doc.clone());
        Ok(())
    }

    async fn delete(&self, _ctx: &CallContext, id: &DocumentId) -> Result<(), AdapterError> {
        self.enter(Phase::Delete, id).await
    }

    async fn read(&self, _ctx: &CallContext, id: &DocumentId) -> Result<Document, AdapterError> {
        self.enter(Phase::Read, id).await?;
        let inner = self.lock();
        inner
            .read_fixture
            .clone()
            .or_else(|| inner.last_written.clone())
            .ok_or_else(|| AdapterError::NotFound(id.clone()))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
