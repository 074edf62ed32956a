//! In-process document store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use pagesync_core::{BackendName, Document, DocumentId};
use pagesync_sync::{AdapterError, CallContext, DocumentAdapter};

/// How the store stamps documents on write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stamping {
    /// Stamp every write with the current time, like a real backend would.
    #[default]
    OnWrite,
    /// Keep whatever timestamp the caller supplied.
    Preserve,
}

/// A [`DocumentAdapter`] backed by a `HashMap`. Clones share storage.
#[derive(Debug, Clone)]
pub struct MemoryAdapter {
    name: BackendName,
    stamping: Stamping,
    documents: Arc<Mutex<HashMap<DocumentId, Document>>>,
}

impl MemoryAdapter {
    pub fn new(name: impl Into<BackendName>) -> Self {
        Self {
            name: name.into(),
            stamping: Stamping::default(),
            documents: Arc::default(),
        }
    }

    pub fn with_stamping(mut self, stamping: Stamping) -> Self {
        self.stamping = stamping;
        self
    }

    /// Seed a document directly, bypassing stamping.
    pub fn insert(&self, doc: Document) {
        self.lock().insert(doc.id.clone(), doc);
    }

    pub fn get(&self, id: &DocumentId) -> Option<Document> {
        self.lock().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn stamp(&self, doc: &Document) -> Document {
        match self.stamping {
            Stamping::OnWrite => doc.clone().with_timestamp(Utc::now()),
            Stamping::Preserve => doc.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<DocumentId, Document>> {
        self.documents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl DocumentAdapter for MemoryAdapter {
    fn name(&self) -> &BackendName {
        &self.name
    }

    async fn create(&self, _ctx: &CallContext, doc: &Document) -> Result<String, AdapterError> {
        let mut documents = self.lock();
        if documents.contains_key(&doc.id) {
            return Err(AdapterError::Conflict(doc.id.clone()));
        }
        documents.insert(doc.id.clone(), self.stamp(doc));
        Ok(doc.id.0.clone())
    }

    async fn update(&self, _ctx: &CallContext, doc: &Document) -> Result<(), AdapterError> {
        let mut documents = self.lock();
        match documents.get_mut(&doc.id) {
            Some(existing) => {
                *existing = self.stamp(doc);
                Ok(())
            }
            None => Err(AdapterError::NotFound(doc.id.clone())),
        }
    }

    async fn delete(&self, _ctx: &CallContext, id: &DocumentId) -> Result<(), AdapterError> {
        self.lock()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| AdapterError::NotFound(id.clone()))
    }

    async fn read(&self, _ctx: &CallContext, id: &DocumentId) -> Result<Document, AdapterError> {
        self.get(id).ok_or_else(|| AdapterError::NotFound(id.clone()))
    }
}
