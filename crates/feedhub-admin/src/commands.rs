//! Command implementations for the admin tool.
//!
//! Handles:
//! - settings: layered config plus CLI overrides
//! - stats: per-entity record and index counts
//! - verify: index consistency check, optionally followed by a rebuild
//! - rebuild-indexes / purge-orphans: repairs, each in one transaction

use std::fs;
use std::io::Write;

use anyhow::{Context, Result};
use tracing::{info, warn};

use feedhub_storage::{purge_orphans, rebuild_indexes, verify_indexes, Database};
use feedhub_types::Settings;

use crate::cli::AdminCommands;

/// Load configuration and apply CLI overrides (highest precedence).
pub fn load_settings(
    config_path: Option<&str>,
    db_path_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;
    if let Some(db_path) = db_path_override {
        settings.db_path = db_path.to_string();
    }
    if let Some(log_level) = log_level_override {
        settings.log_level = log_level.to_string();
    }
    Ok(settings)
}

/// Install the global tracing subscriber. `RUST_LOG` wins over the
/// configured level. Logs go to stderr so reports on stdout stay clean.
pub fn init_logging(settings: &Settings) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level)),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// Open the configured store, creating its parent directory if needed.
pub fn open_database(settings: &Settings) -> Result<Database> {
    let db_path = settings.expanded_db_path();
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    Database::open_with(&db_path, &settings.storage)
        .with_context(|| format!("Failed to open storage at {}", db_path.display()))
}

/// Run one admin command against an open store, writing the report to `out`.
pub fn handle_command<W: Write>(db: &Database, command: AdminCommands, out: &mut W) -> Result<()> {
    match command {
        AdminCommands::Stats => show_stats(db, out),
        AdminCommands::Verify { repair, limit } => verify(db, repair, limit, out),
        AdminCommands::RebuildIndexes => rebuild(db, out),
        AdminCommands::PurgeOrphans => purge(db, out),
    }
}

fn show_stats<W: Write>(db: &Database, out: &mut W) -> Result<()> {
    let stats = db.stats().context("Failed to read statistics")?;

    writeln!(out, "Database: {}", db.path().display())?;
    writeln!(out, "{:<14} {:>10} {:>14}", "entity", "records", "index entries")?;
    for entity in &stats.entities {
        writeln!(
            out,
            "{:<14} {:>10} {:>14}",
            entity.name, entity.records, entity.index_entries
        )?;
    }
    writeln!(out, "Disk usage: {} bytes", stats.disk_usage_bytes)?;
    Ok(())
}

fn verify<W: Write>(db: &Database, repair: bool, limit: usize, out: &mut W) -> Result<()> {
    let report = db
        .select(|tx| verify_indexes(tx))
        .context("Index verification failed")?;

    writeln!(
        out,
        "Checked {} records against {} index entries",
        report.records, report.index_entries
    )?;
    if report.is_consistent() {
        writeln!(out, "All indexes consistent")?;
        return Ok(());
    }

    writeln!(
        out,
        "{} missing, {} stale",
        report.missing.len(),
        report.stale.len()
    )?;
    let issues = report
        .missing
        .iter()
        .map(|issue| ("missing", issue))
        .chain(report.stale.iter().map(|issue| ("stale", issue)));
    for (kind, issue) in issues.take(limit) {
        writeln!(
            out,
            "  {kind:<8} {}.{} {:?} -> {}",
            issue.entity, issue.index, issue.key, issue.id
        )?;
    }

    if repair {
        warn!("Repairing inconsistent indexes");
        rebuild(db, out)
    } else {
        anyhow::bail!("Indexes are inconsistent; run with --repair or rebuild-indexes")
    }
}

fn rebuild<W: Write>(db: &Database, out: &mut W) -> Result<()> {
    let progress = db
        .update(|tx| rebuild_indexes(tx))
        .context("Index rebuild failed")?;
    writeln!(
        out,
        "Rebuilt {} index entries for {} records in {} ms",
        progress.index_entries, progress.records, progress.elapsed_ms
    )?;
    if progress.conflicts > 0 {
        writeln!(
            out,
            "Skipped {} duplicate unique keys (see log)",
            progress.conflicts
        )?;
    }
    Ok(())
}

fn purge<W: Write>(db: &Database, out: &mut W) -> Result<()> {
    let report = db
        .update(|tx| purge_orphans(tx))
        .context("Orphan purge failed")?;
    info!(removed = report.total(), "Purge finished");

    writeln!(out, "Subscriptions removed: {}", report.subscriptions)?;
    writeln!(out, "Groups removed:        {}", report.groups)?;
    writeln!(out, "Group refs dropped:    {}", report.group_refs)?;
    writeln!(out, "Items removed:         {}", report.items)?;
    writeln!(out, "Entries removed:       {}", report.entries)?;
    writeln!(out, "Transmissions removed: {}", report.transmissions)?;
    Ok(())
}
