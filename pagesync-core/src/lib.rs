//! pagesync core library — domain types, backend configuration, errors.
//!
//! - [`types`] — newtypes and the [`Document`] model
//! - [`error`] — [`ConfigError`]
//! - [`config`] — load / save / init of `~/.pagesync/backends.yaml`

pub mod config;
pub mod error;
pub mod types;

pub use config::{AuthConfig, BackendConfig, BackendKind, RestBackend, SyncConfig};
pub use error::ConfigError;
pub use types::{BackendName, Document, DocumentId, Phase};
