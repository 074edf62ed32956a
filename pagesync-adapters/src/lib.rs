//! # pagesync-adapters
//!
//! Concrete [`DocumentAdapter`] implementations and the factory that builds
//! them from `backends.yaml`.
//!
//! - [`memory`] — in-process store
//! - [`directory`] — one JSON file per document
//! - [`rest`] — generic JSON-over-HTTP service
//! - [`pipeline`] — config in, [`SyncReport`](pagesync_sync::SyncReport) out

pub mod directory;
pub mod error;
pub mod memory;
pub mod pipeline;
pub mod rest;

use std::sync::Arc;

use pagesync_core::{BackendConfig, BackendKind, SyncConfig};
use pagesync_sync::DocumentAdapter;

pub use directory::DirectoryAdapter;
pub use error::{BuildError, PipelineError};
pub use memory::{MemoryAdapter, Stamping};
pub use rest::RestAdapter;

/// Build the adapter described by one config entry, labelled with its name.
pub fn build_adapter(config: &BackendConfig) -> Result<Arc<dyn DocumentAdapter>, BuildError> {
    let name = config.name.clone();
    let adapter: Arc<dyn DocumentAdapter> = match &config.kind {
        BackendKind::Memory => Arc::new(MemoryAdapter::new(name)),
        BackendKind::Directory { path } => {
            let adapter = DirectoryAdapter::open(name.clone(), path).map_err(|source| {
                BuildError::Directory {
                    backend: name,
                    path: path.clone(),
                    source,
                }
            })?;
            Arc::new(adapter)
        }
        BackendKind::Rest(rest) => Arc::new(RestAdapter::from_config(name, rest)?),
    };
    tracing::debug!(backend = %config.name, kind = config.kind.label(), "adapter built");
    Ok(adapter)
}

/// Validate `config` and build every backend it lists, in file order.
pub fn build_all(config: &SyncConfig) -> Result<Vec<Arc<dyn DocumentAdapter>>, BuildError> {
    config.validate()?;
    config.backends.iter().map(build_adapter).collect()
}
