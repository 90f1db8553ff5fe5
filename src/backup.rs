// ABOUTME: JSON backups of scraped record sets, written before they are synced
// ABOUTME: One pretty-printed file per listing: backup-{name}-complete.json

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::adapt::RawRecord;

/// Write `records` to `{dir}/backup-{name}-complete.json`, creating `dir`.
pub async fn write_backup(dir: &Path, name: &str, records: &[RawRecord]) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create backup directory {:?}", dir))?;

    let path = dir.join(format!("backup-{}-complete.json", name));
    let content = serde_json::to_string_pretty(records).context("Failed to serialize backup")?;

    tokio::fs::write(&path, content)
        .await
        .with_context(|| format!("Failed to write backup file {:?}", path))?;

    tracing::info!("Saved {} records to {:?}", records.len(), path);
    Ok(path)
}
