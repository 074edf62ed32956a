//! Directory-backed document store: one JSON file per document.
//!
//! ```text
//! <root>/
//!   <id>.json
//! ```
//!
//! Writes go to `<id>.json.tmp` and are renamed into place, so a reader never
//! observes a half-written document. All file I/O runs on the blocking pool.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;

use pagesync_core::{BackendName, Document, DocumentId};
use pagesync_sync::{AdapterError, CallContext, DocumentAdapter};

use crate::memory::Stamping;

#[derive(Debug, Clone)]
pub struct DirectoryAdapter {
    name: BackendName,
    root: PathBuf,
    stamping: Stamping,
}

impl DirectoryAdapter {
    /// Use `root` as the store, creating it if needed.
    pub fn open(name: impl Into<BackendName>, root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            name: name.into(),
            root,
            stamping: Stamping::default(),
        })
    }

    pub fn with_stamping(mut self, stamping: Stamping) -> Self {
        self.stamping = stamping;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<id>.json`, or `InvalidIdentity` if `id` would escape `root`.
    pub fn document_path(&self, id: &DocumentId) -> Result<PathBuf, AdapterError> {
        let raw = id.as_str();
        let escapes = raw.is_empty()
            || raw == "."
            || raw == ".."
            || raw.contains(['/', '\\', '\0']);
        if escapes {
            return Err(AdapterError::InvalidIdentity(raw.to_string()));
        }
        Ok(self.root.join(format!("{raw}.json")))
    }

    fn stamp(&self, doc: &Document) -> Document {
        match self.stamping {
            Stamping::OnWrite => doc.clone().with_timestamp(Utc::now()),
            Stamping::Preserve => doc.clone(),
        }
    }

    async fn blocking<T, F>(&self, work: F) -> Result<T, AdapterError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, AdapterError> + Send + 'static,
    {
        tokio::task::spawn_blocking(work)
            .await
            .map_err(|e| AdapterError::Io(format!("blocking task failed: {e}")))?
    }
}

#[async_trait]
impl DocumentAdapter for DirectoryAdapter {
    fn name(&self) -> &BackendName {
        &self.name
    }

    async fn create(&self, _ctx: &CallContext, doc: &Document) -> Result<String, AdapterError> {
        let path = self.document_path(&doc.id)?;
        let stored = self.stamp(doc);
        self.blocking(move || {
            if path.exists() {
                return Err(AdapterError::Conflict(stored.id.clone()));
            }
            write_document(&path, &stored)?;
            Ok(stored.id.0)
        })
        .await
    }

    async fn update(&self, _ctx: &CallContext, doc: &Document) -> Result<(), AdapterError> {
        let path = self.document_path(&doc.id)?;
        let stored = self.stamp(doc);
        self.blocking(move || {
            if !path.exists() {
                return Err(AdapterError::NotFound(stored.id.clone()));
            }
            write_document(&path, &stored)
        })
        .await
    }

    async fn delete(&self, _ctx: &CallContext, id: &DocumentId) -> Result<(), AdapterError> {
        let path = self.document_path(id)?;
        let id = id.clone();
        self.blocking(move || match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AdapterError::NotFound(id)),
            Err(e) => Err(io_failure(&path, e)),
        })
        .await
    }

    async fn read(&self, _ctx: &CallContext, id: &DocumentId) -> Result<Document, AdapterError> {
        let path = self.document_path(id)?;
        let id = id.clone();
        self.blocking(move || {
            let contents = match std::fs::read_to_string(&path) {
                Ok(contents) => contents,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(AdapterError::NotFound(id))
                }
                Err(e) => return Err(io_failure(&path, e)),
            };
            serde_json::from_str(&contents).map_err(|e| {
                AdapterError::MalformedResponse(format!("{}: {e}", path.display()))
            })
        })
        .await
    }
}

fn write_document(path: &Path, doc: &Document) -> Result<(), AdapterError> {
    let json = serde_json::to_string_pretty(doc)
        .map_err(|e| AdapterError::MalformedResponse(e.to_string()))?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(|e| io_failure(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_failure(path, e));
    }
    Ok(())
}

fn io_failure(path: &Path, err: std::io::Error) -> AdapterError {
    AdapterError::Io(format!("{}: {err}", path.display()))
}
