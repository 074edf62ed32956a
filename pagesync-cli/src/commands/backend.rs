//! `pagesync backend list|add|remove`

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use tabled::{settings::Style, Table, Tabled};

use pagesync_core::{
    config, config::DEFAULT_COLLECTION, AuthConfig, BackendConfig, BackendKind, BackendName,
    RestBackend,
};

/// Manage configured backends.
#[derive(Subcommand, Debug)]
pub enum BackendCommand {
    /// List configured backends.
    List {
        /// Emit machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Add a backend to the config.
    Add(AddArgs),

    /// Remove a backend by name.
    Remove {
        name: String,
    },
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Unique label used in reports (e.g. "wiki", "kb").
    pub name: String,

    /// Backend flavour: memory | directory | rest.
    #[arg(long, value_name = "KIND")]
    pub kind: KindArg,

    /// Storage directory (directory backends).
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// Service root, e.g. https://kb.example.com/api (rest backends).
    #[arg(long)]
    pub base_url: Option<String>,

    /// Collection segment appended to the base URL.
    #[arg(long, default_value = DEFAULT_COLLECTION)]
    pub collection: String,

    /// Authentication scheme: none | basic | bearer | header.
    #[arg(long, default_value = "none", value_name = "SCHEME")]
    pub auth: AuthArg,

    /// User for basic auth.
    #[arg(long)]
    pub username: Option<String>,

    /// Environment variable holding the password, token or header value.
    #[arg(long, value_name = "VAR")]
    pub secret_env: Option<String>,

    /// Header name for `--auth header`.
    #[arg(long)]
    pub header_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Argument enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindArg {
    Memory,
    Directory,
    Rest,
}

impl FromStr for KindArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "directory" | "dir" => Ok(Self::Directory),
            "rest" => Ok(Self::Rest),
            other => Err(format!(
                "unknown backend kind '{other}'; expected: memory, directory, rest"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthArg {
    None,
    Basic,
    Bearer,
    Header,
}

impl FromStr for AuthArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "basic" => Ok(Self::Basic),
            "bearer" => Ok(Self::Bearer),
            "header" => Ok(Self::Header),
            other => Err(format!(
                "unknown auth scheme '{other}'; expected: none, basic, bearer, header"
            )),
        }
    }
}

impl fmt::Display for AuthArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AuthArg::None => "none",
            AuthArg::Basic => "basic",
            AuthArg::Bearer => "bearer",
            AuthArg::Header => "header",
        };
        f.write_str(label)
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

pub fn run(cmd: BackendCommand) -> Result<()> {
    match cmd {
        BackendCommand::List { json } => list(json),
        BackendCommand::Add(args) => add(args),
        BackendCommand::Remove { name } => remove(name),
    }
}

#[derive(Tabled)]
struct BackendRow {
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "kind")]
    kind: String,
    #[tabled(rename = "target")]
    target: String,
    #[tabled(rename = "auth")]
    auth: String,
}

fn list(json: bool) -> Result<()> {
    let config = config::load().context("failed to load backends — run `pagesync init` first")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&config.backends)
                .context("failed to serialize backends")?
        );
        return Ok(());
    }

    if config.backends.is_empty() {
        println!("No backends configured.");
        println!("Run: pagesync backend add <name> --kind directory --path <dir>");
        return Ok(());
    }

    let rows: Vec<BackendRow> = config.backends.iter().map(row).collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}

fn row(backend: &BackendConfig) -> BackendRow {
    let (target, auth) = match &backend.kind {
        BackendKind::Memory => ("(in-process)".to_string(), "-".to_string()),
        BackendKind::Directory { path } => (path.display().to_string(), "-".to_string()),
        BackendKind::Rest(rest) => (
            format!("{}/{}", rest.base_url.trim_end_matches('/'), rest.collection),
            auth_label(&rest.auth),
        ),
    };
    BackendRow {
        name: backend.name.to_string(),
        kind: backend.kind.label().to_string(),
        target,
        auth,
    }
}

fn auth_label(auth: &AuthConfig) -> String {
    match auth {
        AuthConfig::None => "none".to_string(),
        AuthConfig::Basic {
            username,
            password_env,
        } => format!("basic {username} (${password_env})"),
        AuthConfig::Bearer { token_env } => format!("bearer (${token_env})"),
        AuthConfig::Header { name, value_env } => format!("{name} (${value_env})"),
    }
}

fn add(args: AddArgs) -> Result<()> {
    let name = args.name.clone();
    let backend = backend_from_args(args)?;
    let kind = backend.kind.label();
    config::add_backend(backend).with_context(|| format!("failed to add backend '{name}'"))?;
    println!("✓ Added {kind} backend '{name}'");
    Ok(())
}

fn remove(name: String) -> Result<()> {
    config::remove_backend(&BackendName::from(name.clone()))
        .with_context(|| format!("failed to remove backend '{name}'"))?;
    println!("✓ Removed backend '{name}'");
    Ok(())
}

fn backend_from_args(args: AddArgs) -> Result<BackendConfig> {
    let kind = match args.kind {
        KindArg::Memory => BackendKind::Memory,
        KindArg::Directory => {
            let path = args.path.context("--path is required for directory backends")?;
            BackendKind::Directory { path }
        }
        KindArg::Rest => {
            let base_url = args
                .base_url
                .context("--base-url is required for rest backends")?;
            let auth = auth_from_args(args.auth, args.username, args.secret_env, args.header_name)?;
            BackendKind::Rest(RestBackend {
                base_url,
                collection: args.collection,
                auth,
            })
        }
    };
    Ok(BackendConfig {
        name: BackendName::from(args.name),
        kind,
    })
}

fn auth_from_args(
    scheme: AuthArg,
    username: Option<String>,
    secret_env: Option<String>,
    header_name: Option<String>,
) -> Result<AuthConfig> {
    let secret = |scheme: AuthArg| {
        secret_env
            .clone()
            .with_context(|| format!("--secret-env is required for --auth {scheme}"))
    };
    let auth = match scheme {
        AuthArg::None => AuthConfig::None,
        AuthArg::Basic => AuthConfig::Basic {
            username: username.context("--username is required for --auth basic")?,
            password_env: secret(scheme)?,
        },
        AuthArg::Bearer => AuthConfig::Bearer {
            token_env: secret(scheme)?,
        },
        AuthArg::Header => AuthConfig::Header {
            name: header_name.context("--header-name is required for --auth header")?,
            value_env: secret(scheme)?,
        },
    };
    if scheme == AuthArg::None && secret_env.is_some() {
        bail!("--secret-env given but --auth is none");
    }
    Ok(auth)
}
