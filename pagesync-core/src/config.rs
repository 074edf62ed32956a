//! Backend configuration file.
//!
//! # Storage layout
//!
//! ```text
//! ~/.pagesync/
//!   backends.yaml   (mode 0600, directory mode 0700)
//! ```
//!
//! # API pattern
//!
//! Every function touching the file has two forms:
//! - `fn_at(home: &Path, …)` — explicit home; used in tests with `TempDir`
//! - `fn(…)` — derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Tests must NEVER call the no-arg wrappers; always use `_at`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::BackendName;

pub const CONFIG_VERSION: u32 = 1;
pub const DEFAULT_COLLECTION: &str = "pages";

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// Root of `backends.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub version: u32,
    /// Per-call deadline handed to every adapter. Absent means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_timeout_ms: Option<u64>,
    #[serde(default)]
    pub backends: Vec<BackendConfig>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            call_timeout_ms: None,
            backends: Vec::new(),
        }
    }
}

impl SyncConfig {
    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_ms.map(Duration::from_millis)
    }

    pub fn backend(&self, name: &BackendName) -> Option<&BackendConfig> {
        self.backends.iter().find(|b| &b.name == name)
    }

    /// Reject duplicate or empty names and unusable backend entries.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for backend in &self.backends {
            if backend.name.0.trim().is_empty() {
                return Err(ConfigError::InvalidBackend {
                    name: backend.name.clone(),
                    reason: "name must not be empty".to_string(),
                });
            }
            if !seen.insert(&backend.name) {
                return Err(ConfigError::DuplicateBackend(backend.name.clone()));
            }
            backend.validate()?;
        }
        Ok(())
    }
}

/// One configured backend: a unique label plus how to reach it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub name: BackendName,
    #[serde(flatten)]
    pub kind: BackendKind,
}

impl BackendConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidBackend {
            name: self.name.clone(),
            reason: reason.to_string(),
        };
        match &self.kind {
            BackendKind::Memory => Ok(()),
            BackendKind::Directory { path } if path.as_os_str().is_empty() => {
                Err(invalid("directory path must not be empty"))
            }
            BackendKind::Directory { .. } => Ok(()),
            BackendKind::Rest(rest) => {
                if !(rest.base_url.starts_with("http://") || rest.base_url.starts_with("https://")) {
                    return Err(invalid("base_url must start with http:// or https://"));
                }
                if rest.collection.trim().is_empty() || rest.collection.contains('/') {
                    return Err(invalid("collection must be a single non-empty path segment"));
                }
                Ok(())
            }
        }
    }
}

/// Backend flavour, tagged by `kind:` in YAML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process store; contents vanish with the process.
    Memory,
    /// One JSON file per document under `path`.
    Directory { path: PathBuf },
    /// Generic JSON-over-HTTP document service.
    Rest(RestBackend),
}

impl BackendKind {
    pub fn label(&self) -> &'static str {
        match self {
            BackendKind::Memory => "memory",
            BackendKind::Directory { .. } => "directory",
            BackendKind::Rest(_) => "rest",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestBackend {
    pub base_url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default)]
    pub auth: AuthConfig,
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

/// How a REST backend authenticates. Secrets are never stored in the file;
/// only the names of the environment variables holding them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "scheme", rename_all = "lowercase")]
pub enum AuthConfig {
    #[default]
    None,
    Basic {
        username: String,
        password_env: String,
    },
    Bearer {
        token_env: String,
    },
    Header {
        name: String,
        value_env: String,
    },
}

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.pagesync/`
///
/// Creates the directory (mode `0700`) if it does not yet exist.
pub fn config_dir_at(home: &Path) -> Result<PathBuf, ConfigError> {
    let dir = home.join(".pagesync");
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
        set_dir_permissions(&dir)?;
    }
    Ok(dir)
}

/// `<home>/.pagesync/backends.yaml` — pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    home.join(".pagesync").join("backends.yaml")
}

/// `config_path_at` convenience wrapper.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    Ok(config_path_at(&home()?))
}

// ---------------------------------------------------------------------------
// 2. Load
// ---------------------------------------------------------------------------

/// Load and validate the config at an arbitrary path.
///
/// Returns `ConfigError::ConfigNotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_from(path: &Path) -> Result<SyncConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::ConfigNotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path)?;
    let config: SyncConfig = serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    config.validate()?;
    Ok(config)
}

/// Load `<home>/.pagesync/backends.yaml`.
pub fn load_at(home: &Path) -> Result<SyncConfig, ConfigError> {
    load_from(&config_path_at(home))
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<SyncConfig, ConfigError> {
    load_at(&home()?)
}

// ---------------------------------------------------------------------------
// 3. Save (atomic)
// ---------------------------------------------------------------------------

/// Atomically save the config to `<home>/.pagesync/backends.yaml`.
///
/// Write flow: validate → serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(home: &Path, config: &SyncConfig) -> Result<(), ConfigError> {
    config.validate()?;
    config_dir_at(home)?;
    let path = config_path_at(home);
    let tmp_path = path.with_file_name("backends.yaml.tmp");

    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&tmp_path, yaml)?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path)?;
    Ok(())
}

/// `save_at` convenience wrapper.
pub fn save(config: &SyncConfig) -> Result<(), ConfigError> {
    save_at(&home()?, config)
}

// ---------------------------------------------------------------------------
// 4. Init
// ---------------------------------------------------------------------------

/// Write an empty config if none exists.
///
/// Idempotent: if the file already exists, loads and returns it unchanged.
pub fn init_at(home: &Path) -> Result<SyncConfig, ConfigError> {
    if config_path_at(home).exists() {
        return load_at(home);
    }
    let config = SyncConfig::default();
    save_at(home, &config)?;
    Ok(config)
}

/// `init_at` convenience wrapper.
pub fn init() -> Result<SyncConfig, ConfigError> {
    init_at(&home()?)
}

// ---------------------------------------------------------------------------
// 5. Backend management
// ---------------------------------------------------------------------------

/// Append a backend. Creates the config if absent; rejects duplicate names.
pub fn add_backend_at(home: &Path, backend: BackendConfig) -> Result<SyncConfig, ConfigError> {
    let mut config = init_at(home)?;
    if config.backend(&backend.name).is_some() {
        return Err(ConfigError::DuplicateBackend(backend.name));
    }
    config.backends.push(backend);
    save_at(home, &config)?;
    Ok(config)
}

/// `add_backend_at` convenience wrapper.
pub fn add_backend(backend: BackendConfig) -> Result<SyncConfig, ConfigError> {
    add_backend_at(&home()?, backend)
}

/// Remove a backend by name; `ConfigError::UnknownBackend` if it isn't there.
pub fn remove_backend_at(home: &Path, name: &BackendName) -> Result<SyncConfig, ConfigError> {
    let mut config = load_at(home)?;
    let before = config.backends.len();
    config.backends.retain(|b| &b.name != name);
    if config.backends.len() == before {
        return Err(ConfigError::UnknownBackend(name.clone()));
    }
    save_at(home, &config)?;
    Ok(config)
}

/// `remove_backend_at` convenience wrapper.
pub fn remove_backend(name: &BackendName) -> Result<SyncConfig, ConfigError> {
    remove_backend_at(&home()?, name)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
