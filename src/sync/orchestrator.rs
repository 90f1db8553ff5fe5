// ABOUTME: SyncOrchestrator - drives introspect, adapt, write, verify per table/batch
// ABOUTME: Catches failures at table granularity so every run yields a full report

use crate::adapt::{RawRecord, RecordAdapter};
use crate::destination::Destination;
use crate::schema::SchemaIntrospector;
use crate::source::RecordProducer;
use crate::verify::ConsistencyVerifier;
use crate::writer::{DestinationWriter, WriteMode};

use super::report::{BatchResult, BatchStatus, SyncReport};

/// Behavior switches for a run.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Let an empty source clear its destination table in replace mode
    pub allow_empty_replace: bool,
}

/// Runs batches strictly one after another: a batch is introspected,
/// adapted, written, and verified before the next one starts.
pub struct SyncOrchestrator {
    introspector: SchemaIntrospector,
    verifier: ConsistencyVerifier,
    options: SyncOptions,
}

impl SyncOrchestrator {
    pub fn new(options: SyncOptions) -> Self {
        Self {
            introspector: SchemaIntrospector::new(),
            verifier: ConsistencyVerifier::new(),
            options,
        }
    }

    /// Sync `tables`, in the given order, from `producer` into `destination`.
    ///
    /// Replace mode is a full resync; upsert-skip only adds rows whose
    /// conflict key is missing. A failing table is reported as failed and
    /// the next table still runs.
    pub async fn sync_tables<P, D>(
        &self,
        producer: &P,
        destination: &mut D,
        tables: &[String],
        mode: &WriteMode,
    ) -> SyncReport
    where
        P: RecordProducer + ?Sized,
        D: Destination + ?Sized,
    {
        let mut report = SyncReport::new();

        tracing::info!(
            "Syncing {} tables into {} ({})",
            tables.len(),
            destination.label(),
            mode.describe()
        );

        for table in tables {
            let result = self.sync_table(producer, destination, table, mode).await;
            report.push(result);
        }

        report.finish()
    }

    /// Fetch `table` from `producer` and write it to the destination table
    /// of the same name.
    pub async fn sync_table<P, D>(
        &self,
        producer: &P,
        destination: &mut D,
        table: &str,
        mode: &WriteMode,
    ) -> BatchResult
    where
        P: RecordProducer + ?Sized,
        D: Destination + ?Sized,
    {
        tracing::info!("Syncing table '{}'", table);

        let records = match producer.fetch_all(table).await {
            Ok(records) => records,
            Err(e) => {
                tracing::error!("Failed to read '{}' from source: {:?}", table, e);
                return BatchResult::failed(
                    table,
                    table,
                    destination.label(),
                    0,
                    format!("source read failed: {:#}", e),
                );
            }
        };
        tracing::info!("Found {} records for '{}' in source", records.len(), table);

        self.sync_batch(table, table, &records, destination, mode)
            .await
    }

    /// Write one batch of already-fetched records to one destination.
    pub async fn sync_batch<D>(
        &self,
        batch: &str,
        table: &str,
        records: &[RawRecord],
        destination: &mut D,
        mode: &WriteMode,
    ) -> BatchResult
    where
        D: Destination + ?Sized,
    {
        let label = destination.label().to_string();
        let source_count = records.len() as u64;

        if records.is_empty() && *mode == WriteMode::Replace && !self.options.allow_empty_replace {
            tracing::warn!(
                "Source for '{}' is empty; leaving {}.{} untouched",
                batch,
                label,
                table
            );
            return BatchResult::failed(
                batch,
                table,
                &label,
                0,
                "source returned no records; refusing to clear the destination table",
            );
        }

        let schema = match self.introspector.introspect(destination, table).await {
            Ok(schema) => schema,
            Err(e) => {
                tracing::error!("{}", e);
                return BatchResult::failed(batch, table, &label, source_count, e.to_string());
            }
        };

        let adapted = RecordAdapter::new(&schema).adapt_all(records);

        let summary = match DestinationWriter::new(&mut *destination)
            .write(table, &adapted.records, mode)
            .await
        {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!("{}", e);
                let kept = destination.unrevertable_writes();
                let message = if kept > 0 {
                    format!("{}; {} rows written before the failure were kept", e, kept)
                } else {
                    e.to_string()
                };
                let mut result = BatchResult::failed(batch, table, &label, source_count, message);
                result.inserted_count = kept;
                result.dropped_columns = adapted.dropped_columns;
                return result;
            }
        };

        let inserted = summary.inserted() as u64;
        let (verified, status, error) = match self.verifier.verify(destination, table).await {
            Ok(count) => {
                let verified = count - summary.baseline_rows;
                (verified, ConsistencyVerifier::classify(inserted, verified), None)
            }
            Err(e) => {
                tracing::error!("{:?}", e);
                (0, BatchStatus::Mismatched, Some(format!("{:#}", e)))
            }
        };

        match status {
            BatchStatus::Succeeded => tracing::info!(
                "Verified {}.{}: {} rows from batch '{}'",
                label,
                table,
                verified,
                batch
            ),
            _ => tracing::warn!(
                "Verification of {}.{} for batch '{}' disagrees: inserted {}, found {}",
                label,
                table,
                batch,
                inserted,
                verified
            ),
        }

        BatchResult {
            batch: batch.to_string(),
            table: table.to_string(),
            destination: label,
            source_count,
            inserted_count: inserted,
            skipped_count: summary.skipped() as u64,
            failed_count: summary.failed() as u64,
            verified_count: verified,
            status,
            dropped_columns: adapted.dropped_columns,
            error,
        }
    }

    /// Write one batch to several destinations, one after another.
    pub async fn sync_batch_everywhere(
        &self,
        batch: &str,
        table: &str,
        records: &[RawRecord],
        destinations: Vec<&mut dyn Destination>,
        mode: &WriteMode,
    ) -> SyncReport {
        let mut report = SyncReport::new();
        for destination in destinations {
            let result = self
                .sync_batch(batch, table, records, destination, mode)
                .await;
            report.push(result);
        }
        report.finish()
    }
}
