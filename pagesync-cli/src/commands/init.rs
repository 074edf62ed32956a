//! `pagesync init`

use anyhow::{Context, Result};
use clap::Args;

use pagesync_core::config;

/// Create the backend config if it does not exist.
#[derive(Args, Debug)]
pub struct InitArgs {}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let path = config::config_path().context("could not determine config location")?;
        let existed = path.exists();
        let config = config::init().context("failed to initialize backend config")?;

        if existed {
            println!(
                "✓ Config already present at {} ({} backends)",
                path.display(),
                config.backends.len()
            );
        } else {
            println!("✓ Created {}", path.display());
            println!("  Next: pagesync backend add <name> --kind directory --path <dir>");
        }
        Ok(())
    }
}
