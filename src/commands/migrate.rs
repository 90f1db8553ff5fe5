// ABOUTME: migrate command - copies cloud store tables into PostgreSQL
// ABOUTME: Full resync (replace) by default, or incremental inserts keyed on one column

use std::time::Duration;

use anyhow::Result;

use crate::config::SyncConfig;
use crate::destination::postgres::PgDestination;
use crate::source::CloudStore;
use crate::sync::{SyncOptions, SyncOrchestrator, SyncReport};
use crate::writer::WriteMode;

use super::CloudCredentials;

const CLOUD_READ_TIMEOUT: Duration = Duration::from_secs(60);

pub struct MigrateOptions {
    pub target: String,
    pub cloud: CloudCredentials,
    /// Overrides the configured table list when non-empty
    pub tables: Vec<String>,
    /// Insert only rows whose value in this column is missing locally,
    /// leaving existing rows alone. `None` replaces each table.
    pub incremental_key: Option<String>,
}

impl MigrateOptions {
    fn mode(&self) -> WriteMode {
        match &self.incremental_key {
            Some(key) => WriteMode::incremental(key),
            None => WriteMode::Replace,
        }
    }
}

pub async fn migrate(config: &SyncConfig, opts: MigrateOptions) -> Result<SyncReport> {
    if let Some(key) = &opts.incremental_key {
        crate::utils::validate_postgres_identifier(key)?;
    }
    let mode = opts.mode();

    let tables = if opts.tables.is_empty() {
        config.tables.clone()
    } else {
        for table in &opts.tables {
            crate::utils::validate_postgres_identifier(table)?;
        }
        opts.tables
    };

    let producer = CloudStore::new(opts.cloud.client(CLOUD_READ_TIMEOUT)?);
    let mut destination = PgDestination::connect(&opts.target, &config.schema).await?;

    let orchestrator = SyncOrchestrator::new(SyncOptions {
        allow_empty_replace: config.allow_empty_replace,
    });

    tracing::info!(
        "Migrating {} tables from {} ({})",
        tables.len(),
        opts.cloud.url,
        mode.describe()
    );
    Ok(orchestrator
        .sync_tables(&producer, &mut destination, &tables, &mode)
        .await)
}
