//! pagesync — keep one page consistent across several document backends.
//!
//! # Usage
//!
//! ```text
//! pagesync init
//! pagesync backend list [--json]
//! pagesync backend add <name> --kind memory|directory|rest [--path P] [--base-url U] ...
//! pagesync backend remove <name>
//! pagesync sync --id <id> --title <t> (--content <c> | --content-file <f>) [--json]
//! pagesync read <id> [--json]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{backend::BackendCommand, init::InitArgs, read::ReadArgs, sync::SyncArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "pagesync",
    version,
    about = "Synchronize a page across multiple document backends",
    long_about = None,
)]
struct Cli {
    /// Log progress to stderr (same as RUST_LOG=info).
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create ~/.pagesync/backends.yaml if it does not exist.
    Init(InitArgs),

    /// Manage configured backends.
    Backend {
        #[command(subcommand)]
        command: BackendCommand,
    },

    /// Push a page through create, update, delete and read on every backend.
    Sync(SyncArgs),

    /// Read a page from every backend and pick the most recent copy.
    Read(ReadArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Backend { command } => commands::backend::run(command),
        Commands::Sync(args) => args.run(),
        Commands::Read(args) => args.run(),
    }
}

/// stdout carries only command output; diagnostics go to stderr.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
