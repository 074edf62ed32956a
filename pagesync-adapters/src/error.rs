//! Error types for pagesync-adapters.

use std::path::PathBuf;

use thiserror::Error;

use pagesync_core::{BackendName, ConfigError};
use pagesync_sync::SyncError;

/// Failure to turn a [`BackendConfig`](pagesync_core::BackendConfig) into a
/// live adapter.
#[derive(Debug, Error)]
pub enum BuildError {
    /// An auth secret is configured by environment variable name, but the
    /// variable is unset or empty.
    #[error("backend '{backend}': environment variable {var} is not set")]
    MissingSecret { backend: BackendName, var: String },

    #[error("backend '{backend}': invalid base URL '{url}'")]
    InvalidBaseUrl { backend: BackendName, url: String },

    #[error("backend '{backend}': invalid header value for {header}")]
    InvalidHeader { backend: BackendName, header: String },

    #[error("backend '{backend}': cannot open {path}: {source}")]
    Directory {
        backend: BackendName,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors from the config-driven entrypoints in [`crate::pipeline`].
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}
