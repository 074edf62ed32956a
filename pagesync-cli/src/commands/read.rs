//! `pagesync read <id>`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use pagesync_adapters::pipeline;
use pagesync_core::{DocumentId, Phase};

use super::{block_on_cancellable, load_config, report};

/// Arguments for `pagesync read`.
#[derive(Args, Debug)]
pub struct ReadArgs {
    pub id: String,

    /// Per-call deadline in milliseconds; overrides the config.
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Emit the report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl ReadArgs {
    pub fn run(self) -> Result<()> {
        let config = load_config(self.config.as_deref(), self.timeout_ms)?;
        let id = DocumentId::from(self.id.clone());

        let report = block_on_cancellable(|cancel| async move {
            pipeline::run_reconcile(&config, &id, cancel).await
        })?
        .with_context(|| format!("read failed for '{}'", self.id))?;

        if self.json {
            return report::print_json(&report);
        }
        report::print_table(&report, &[Phase::Read]);
        Ok(())
    }
}
