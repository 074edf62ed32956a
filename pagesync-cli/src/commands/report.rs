//! Rendering of a [`SyncReport`] for `sync` and `read`.

use anyhow::{Context, Result};
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use pagesync_core::Phase;
use pagesync_sync::{OperationOutcome, SyncReport};

#[derive(Tabled)]
struct BackendRow {
    #[tabled(rename = "backend")]
    backend: String,
    #[tabled(rename = "read")]
    read: String,
    #[tabled(rename = "updated")]
    updated: String,
    #[tabled(rename = "failed phases")]
    failed_phases: String,
}

pub fn print_json(report: &SyncReport) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(report).context("failed to serialize report")?
    );
    Ok(())
}

pub fn print_table(report: &SyncReport, phases: &[Phase]) {
    let phase_list: Vec<String> = phases.iter().map(Phase::to_string).collect();
    println!(
        "Document '{}' | {} backends | {} | {} failures",
        report.document_id,
        report.backends.len(),
        phase_list.join(" → "),
        report.failure_count(),
    );

    if report.backends.is_empty() {
        println!("No backends configured.");
        return;
    }

    let rows: Vec<BackendRow> = report
        .backends
        .iter()
        .map(|backend| {
            let (read, updated) = match report.reads.get(backend) {
                Some(OperationOutcome::Success {
                    document: Some(doc),
                }) => ("ok".to_string(), doc.timestamp.to_rfc3339()),
                Some(OperationOutcome::Success { document: None }) => {
                    ("ok".to_string(), "-".to_string())
                }
                Some(OperationOutcome::Failure { kind, .. }) => (kind.to_string(), "-".to_string()),
                None => ("-".to_string(), "-".to_string()),
            };
            let failed_phases = report
                .failures
                .get(backend)
                .map(|failures| {
                    failures
                        .iter()
                        .map(|f| f.phase.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .unwrap_or_default();
            BackendRow {
                backend: backend.to_string(),
                read,
                updated,
                failed_phases,
            }
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    for failure in report.failures.values().flatten() {
        println!("  {} {failure}", "✗".red().bold());
    }

    match &report.selected {
        Some(selected) => println!(
            "{} Most recent: '{}' from {} ({})",
            "✓".green().bold(),
            selected.document.title,
            selected.backend,
            selected.document.timestamp.to_rfc3339(),
        ),
        None => println!(
            "{} No backend returned the document",
            "■".bright_black().bold()
        ),
    }
}
