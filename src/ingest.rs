//! `ingest` and `delete` commands.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use docfusion_core::ingest::IngestReport;

use crate::app::Services;
use crate::config::Config;

/// Ingest a directory (or `ingest.root`) and print a summary.
///
/// Ctrl-C stops new files from starting; files in flight finish.
pub async fn run_ingest(
    config: &Config,
    dir: Option<PathBuf>,
    concurrency: Option<usize>,
    json: bool,
) -> Result<()> {
    let root = dir
        .or_else(|| config.ingest.root.clone())
        .context("No directory given and ingest.root is not configured")?;

    let mut options = config.ingest.options();
    if let Some(n) = concurrency {
        options.concurrency = n.max(1);
    }

    let services = Services::open(config).await?;
    let coordinator = services.coordinator(options);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight files");
            on_interrupt.cancel();
        }
    });

    let result = coordinator.ingest_directory(&root, &cancel).await;
    watcher.abort();
    services.close().await;

    let report =
        result.with_context(|| format!("Ingestion of '{}' failed", root.display()))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&root, &report);
    }
    Ok(())
}

fn print_report(root: &Path, report: &IngestReport) {
    if report.cancelled {
        println!("Ingestion of '{}' cancelled.", root.display());
    } else {
        println!("Ingestion of '{}' completed.", root.display());
    }
    println!("  candidates: {}", report.candidates);
    println!("  ingested: {}", report.ingested.len());
    for file in &report.ingested {
        println!("    + {} ({} chunks)", file.filename, file.chunks);
    }
    println!("  already present: {}", report.skipped());
    if !report.name_collisions.is_empty() {
        println!("  skipped (duplicate name): {}", report.name_collisions.len());
        for path in &report.name_collisions {
            println!("    = {}", path.display());
        }
    }
    if !report.failed.is_empty() {
        println!("  failed: {}", report.failed.len());
        for failure in &report.failed {
            println!("    ! {}: {}", failure.filename, failure.error);
        }
    }
}

/// Delete a file and all its chunks by filename.
pub async fn run_delete(config: &Config, filename: &str) -> Result<()> {
    let services = Services::open(config).await?;
    let coordinator = services.coordinator(config.ingest.options());
    let result = coordinator.delete_file(filename).await;
    services.close().await;

    if result? {
        println!("deleted {}", filename);
    } else {
        println!("not found: {}", filename);
    }
    Ok(())
}
