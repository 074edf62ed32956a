//! `pagesync sync` — run the full protocol for one page.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;

use pagesync_adapters::pipeline;
use pagesync_core::{Document, Phase};

use super::{block_on_cancellable, load_config, report};

/// Arguments for `pagesync sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Page identity, shared by every backend.
    #[arg(long)]
    pub id: String,

    #[arg(long)]
    pub title: String,

    /// Page body.
    #[arg(long, conflicts_with = "content_file", required_unless_present = "content_file")]
    pub content: Option<String>,

    /// Read the page body from a file.
    #[arg(long, value_name = "FILE")]
    pub content_file: Option<PathBuf>,

    /// Modification time (RFC 3339). Defaults to now.
    #[arg(long, value_name = "RFC3339")]
    pub timestamp: Option<String>,

    /// Per-call deadline in milliseconds; overrides the config.
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Read backends from this file instead of ~/.pagesync/backends.yaml.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Emit the report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let config = load_config(self.config.as_deref(), self.timeout_ms)?;
        let document = self.document()?;

        let report = block_on_cancellable(|cancel| async move {
            pipeline::run_sync(&config, &document, cancel).await
        })?
        .with_context(|| format!("sync failed for '{}'", self.id))?;

        if self.json {
            return report::print_json(&report);
        }
        report::print_table(&report, &Phase::ALL);
        Ok(())
    }

    fn document(&self) -> Result<Document> {
        let content = match (&self.content, &self.content_file) {
            (Some(content), _) => content.clone(),
            (None, Some(path)) => std::fs::read_to_string(path)
                .with_context(|| format!("cannot read content file '{}'", path.display()))?,
            (None, None) => anyhow::bail!("provide --content or --content-file"),
        };
        let timestamp = match &self.timestamp {
            Some(raw) => DateTime::parse_from_rfc3339(raw)
                .with_context(|| format!("invalid --timestamp '{raw}'; expected RFC 3339"))?
                .with_timezone(&Utc),
            None => Utc::now(),
        };
        Ok(Document::new(
            self.id.clone(),
            self.title.clone(),
            content,
            timestamp,
        ))
    }
}
