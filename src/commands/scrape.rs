// ABOUTME: scrape command - collects school listings and syncs them everywhere
// ABOUTME: Upsert-skip writes to PostgreSQL and, unless disabled, the cloud store

use std::time::Duration;

use anyhow::{bail, Result};

use crate::backup::write_backup;
use crate::config::SyncConfig;
use crate::destination::postgres::PgDestination;
use crate::destination::rest::RestDestination;
use crate::destination::Destination;
use crate::source::{ListingScraper, RecordProducer};
use crate::sync::{BatchResult, SyncOptions, SyncOrchestrator, SyncReport};
use crate::writer::WriteMode;

use super::CloudCredentials;

pub struct ScrapeOptions {
    pub target: String,
    /// `None` skips the cloud destination
    pub cloud: Option<CloudCredentials>,
    /// Only these listings; all configured listings when empty
    pub redes: Vec<String>,
}

pub async fn scrape(config: &SyncConfig, opts: ScrapeOptions) -> Result<SyncReport> {
    let settings = &config.scrape;
    let scraper = ListingScraper::new(settings)?;

    let redes: Vec<String> = if opts.redes.is_empty() {
        scraper.sources().iter().map(|s| s.rede.clone()).collect()
    } else {
        for rede in &opts.redes {
            if !scraper.sources().iter().any(|s| &s.rede == rede) {
                bail!("No listing configured for rede '{}'", rede);
            }
        }
        opts.redes
    };

    let mut postgres = PgDestination::connect(&opts.target, &config.schema).await?;
    let mut cloud = match &opts.cloud {
        Some(credentials) => Some(RestDestination::new(
            credentials.client(Duration::from_secs(settings.request_timeout_secs))?,
        )),
        None => {
            tracing::info!("Cloud store disabled; writing to PostgreSQL only");
            None
        }
    };

    let orchestrator = SyncOrchestrator::new(SyncOptions {
        allow_empty_replace: config.allow_empty_replace,
    });
    let mode = WriteMode::UpsertSkip {
        conflict_columns: settings.conflict_columns.clone(),
    };

    let mut report = SyncReport::new();
    for rede in &redes {
        let mut destinations: Vec<&mut dyn Destination> = Vec::new();
        destinations.push(&mut postgres);
        if let Some(cloud) = cloud.as_mut() {
            destinations.push(cloud);
        }

        let records = match scraper.fetch_all(rede).await {
            Ok(records) => records,
            Err(e) => {
                tracing::error!("Failed to scrape '{}' listing: {:?}", rede, e);
                for destination in destinations {
                    report.push(BatchResult::failed(
                        rede,
                        &settings.table,
                        destination.label(),
                        0,
                        format!("scrape failed: {:#}", e),
                    ));
                }
                continue;
            }
        };

        if let Some(dir) = &settings.backup_dir {
            if let Err(e) = write_backup(dir, rede, &records).await {
                tracing::warn!("Could not back up '{}' listing: {:#}", rede, e);
            }
        }

        let batch = orchestrator
            .sync_batch_everywhere(rede, &settings.table, &records, destinations, &mode)
            .await;
        report.extend(batch);
    }

    Ok(report.finish())
}
