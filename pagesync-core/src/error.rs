//! Error types for pagesync-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::BackendName;

/// All errors that can arise from backend configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure (file not found, permission denied, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load — includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None` — cannot locate `~/.pagesync/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// The config file did not exist at the expected path.
    #[error("config not found at {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("backend '{0}' is defined more than once")]
    DuplicateBackend(BackendName),

    #[error("no backend named '{0}'")]
    UnknownBackend(BackendName),

    /// A backend entry is structurally valid YAML but unusable.
    #[error("invalid backend '{name}': {reason}")]
    InvalidBackend { name: BackendName, reason: String },
}
