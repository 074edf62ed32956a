pub mod backend;
pub mod init;
pub mod read;
pub mod report;
pub mod sync;

use std::future::Future;
use std::path::Path;

use anyhow::{Context, Result};

use pagesync_core::{config, SyncConfig};
use pagesync_sync::CancellationToken;

/// Load backends from `--config` if given, else from `~/.pagesync/`, and
/// apply a `--timeout-ms` override.
pub fn load_config(path: Option<&Path>, timeout_ms: Option<u64>) -> Result<SyncConfig> {
    let mut config = match path {
        Some(path) => config::load_from(path)
            .with_context(|| format!("failed to load backends from {}", path.display()))?,
        None => config::load().context("failed to load backends — run `pagesync init` first")?,
    };
    if timeout_ms.is_some() {
        config.call_timeout_ms = timeout_ms;
    }
    Ok(config)
}

/// Run `task` on a fresh multi-threaded runtime. Ctrl-C cancels the token
/// handed to it instead of killing the process, so a partial report still
/// prints.
pub fn block_on_cancellable<F, Fut>(task: F) -> Result<Fut::Output>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    Ok(runtime.block_on(async move {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted; cancelling outstanding backend calls");
                on_interrupt.cancel();
            }
        });
        task(cancel).await
    }))
}
