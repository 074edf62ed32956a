//! Config-driven sync entrypoints shared by the CLI and embedders.

use pagesync_core::{Document, DocumentId, SyncConfig};
use pagesync_sync::{CancellationToken, Orchestrator, SyncOptions, SyncReport};

use crate::{build_all, PipelineError};

/// Orchestrator configured from the file's `call_timeout_ms`.
pub fn orchestrator(config: &SyncConfig) -> Orchestrator {
    Orchestrator::new(SyncOptions {
        call_timeout: config.call_timeout(),
    })
}

/// Build every configured backend and run the full protocol for `document`.
pub async fn run_sync(
    config: &SyncConfig,
    document: &Document,
    cancel: CancellationToken,
) -> Result<SyncReport, PipelineError> {
    let adapters = build_all(config)?;
    tracing::info!(
        document = %document.id,
        backends = adapters.len(),
        "starting sync",
    );
    Ok(orchestrator(config)
        .sync_with_cancel(document, &adapters, cancel)
        .await?)
}

/// Build every configured backend and read `id` from each, writing nothing.
pub async fn run_reconcile(
    config: &SyncConfig,
    id: &DocumentId,
    cancel: CancellationToken,
) -> Result<SyncReport, PipelineError> {
    let adapters = build_all(config)?;
    tracing::info!(document = %id, backends = adapters.len(), "starting read");
    Ok(orchestrator(config)
        .reconcile_with_cancel(id, &adapters, cancel)
        .await?)
}
