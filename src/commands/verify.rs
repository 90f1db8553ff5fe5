// ABOUTME: verify command - compares row counts between PostgreSQL and the cloud store
// ABOUTME: Read-only; reports per-table counts and whether they agree

use std::time::Duration;

use anyhow::Result;

use crate::config::SyncConfig;
use crate::destination::postgres::PgDestination;
use crate::destination::rest::RestDestination;
use crate::verify::ConsistencyVerifier;

use super::CloudCredentials;

const CLOUD_READ_TIMEOUT: Duration = Duration::from_secs(60);

pub struct VerifyOptions {
    pub target: String,
    pub cloud: Option<CloudCredentials>,
    pub tables: Vec<String>,
}

/// Row counts of one table. `None` means the count could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableCounts {
    pub table: String,
    pub postgres: Option<i64>,
    pub cloud: Option<i64>,
}

impl TableCounts {
    /// Both counts readable and, when the cloud side was checked, equal.
    pub fn is_consistent(&self, cloud_checked: bool) -> bool {
        match (self.postgres, self.cloud) {
            (Some(pg), Some(cloud)) => pg == cloud,
            (Some(_), None) => !cloud_checked,
            _ => false,
        }
    }

    pub fn render(&self, cloud_checked: bool) -> String {
        let show = |count: Option<i64>| count.map_or_else(|| "error".to_string(), |c| c.to_string());
        if cloud_checked {
            format!(
                "{:<22} postgres={:<8} cloud={}",
                self.table,
                show(self.postgres),
                show(self.cloud)
            )
        } else {
            format!("{:<22} postgres={}", self.table, show(self.postgres))
        }
    }
}

pub async fn verify(config: &SyncConfig, opts: VerifyOptions) -> Result<Vec<TableCounts>> {
    let tables = if opts.tables.is_empty() {
        config.tables.clone()
    } else {
        for table in &opts.tables {
            crate::utils::validate_postgres_identifier(table)?;
        }
        opts.tables
    };

    let verifier = ConsistencyVerifier::new();
    let mut postgres = PgDestination::connect(&opts.target, &config.schema).await?;
    let mut cloud = match &opts.cloud {
        Some(credentials) => Some(RestDestination::new(credentials.client(CLOUD_READ_TIMEOUT)?)),
        None => None,
    };

    let mut counts = Vec::with_capacity(tables.len());
    for table in tables {
        let postgres_count = match verifier.verify(&mut postgres, &table).await {
            Ok(count) => Some(count),
            Err(e) => {
                tracing::warn!("{:#}", e);
                None
            }
        };

        let cloud_count = match cloud.as_mut() {
            Some(cloud) => match verifier.verify(cloud, &table).await {
                Ok(count) => Some(count),
                Err(e) => {
                    tracing::warn!("{:#}", e);
                    None
                }
            },
            None => None,
        };

        counts.push(TableCounts {
            table,
            postgres: postgres_count,
            cloud: cloud_count,
        });
    }

    Ok(counts)
}
