// ABOUTME: DestinationWriter - writes one adapted batch under a single transaction
// ABOUTME: Replace (delete-then-insert) and upsert-skip modes with per-record isolation

use serde::Serialize;

use crate::adapt::AdaptedRecord;
use crate::destination::{Destination, InsertOutcome};
use crate::error::{RecordWriteError, SyncError};

/// How a batch is written to its destination table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Delete every existing row, then insert the batch (full resync)
    Replace,
    /// Insert, skipping rows that collide on the given uniqueness columns
    UpsertSkip { conflict_columns: Vec<String> },
}

impl WriteMode {
    /// Insert-only sync keyed on `key`.
    pub fn incremental(key: &str) -> Self {
        Self::UpsertSkip {
            conflict_columns: vec![key.to_string()],
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Replace => "replace mode".to_string(),
            Self::UpsertSkip { conflict_columns } => {
                format!("upsert-skip on ({})", conflict_columns.join(", "))
            }
        }
    }
}

/// Per-record accounting for one written batch.
#[derive(Debug, Clone, Default)]
pub struct WriteSummary {
    /// One entry per record, in batch order
    pub outcomes: Vec<Result<InsertOutcome, RecordWriteError>>,
    /// Rows in the table once the batch started writing (0 after a replace)
    pub baseline_rows: i64,
    /// Rows removed by replace mode
    pub deleted_rows: u64,
}

impl WriteSummary {
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    pub fn inserted(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, Ok(InsertOutcome::Inserted)))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, Ok(InsertOutcome::Skipped)))
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &RecordWriteError> {
        self.outcomes.iter().filter_map(|o| o.as_ref().err())
    }

    pub fn failed(&self) -> usize {
        self.failures().count()
    }
}

/// Writes adapted batches to one destination.
///
/// All writes of a batch share one transaction that is committed once at the
/// end. A record-level failure is recorded and the batch moves on; any other
/// failure rolls the transaction back and aborts the batch.
pub struct DestinationWriter<'d, D: Destination + ?Sized> {
    destination: &'d mut D,
}

impl<'d, D: Destination + ?Sized> DestinationWriter<'d, D> {
    pub fn new(destination: &'d mut D) -> Self {
        Self { destination }
    }

    pub async fn write(
        &mut self,
        table: &str,
        records: &[AdaptedRecord],
        mode: &WriteMode,
    ) -> Result<WriteSummary, SyncError> {
        self.destination.begin(table).await?;

        match self.write_in_transaction(table, records, mode).await {
            Ok(summary) => {
                if let Err(e) = self.destination.commit(table).await {
                    self.abort(table).await;
                    return Err(e);
                }
                Ok(summary)
            }
            Err(e) => {
                self.abort(table).await;
                Err(e)
            }
        }
    }

    async fn write_in_transaction(
        &mut self,
        table: &str,
        records: &[AdaptedRecord],
        mode: &WriteMode,
    ) -> Result<WriteSummary, SyncError> {
        let mut summary = WriteSummary {
            outcomes: Vec::with_capacity(records.len()),
            ..WriteSummary::default()
        };

        let on_conflict = match mode {
            WriteMode::Replace => {
                summary.deleted_rows = self.destination.delete_all(table).await?;
                None
            }
            WriteMode::UpsertSkip { conflict_columns } => {
                summary.baseline_rows =
                    self.destination.count_rows(table).await.map_err(|e| {
                        SyncError::batch_fatal(
                            table,
                            self.destination.label(),
                            format!("failed to read starting row count: {:#}", e),
                        )
                    })?;
                Some(conflict_columns.as_slice())
            }
        };

        for (index, record) in records.iter().enumerate() {
            match self
                .destination
                .insert(table, index, record, on_conflict)
                .await
            {
                Ok(outcome) => summary.outcomes.push(Ok(outcome)),
                Err(SyncError::RecordWrite(e)) => {
                    tracing::warn!("{}", e);
                    summary.outcomes.push(Err(e));
                }
                Err(fatal) => return Err(fatal),
            }
        }

        tracing::info!(
            "Wrote '{}' on {}: {} inserted, {} skipped, {} failed",
            table,
            self.destination.label(),
            summary.inserted(),
            summary.skipped(),
            summary.failed()
        );

        Ok(summary)
    }

    async fn abort(&mut self, table: &str) {
        if let Err(e) = self.destination.rollback(table).await {
            tracing::error!(
                "Rollback of '{}' on {} failed: {}",
                table,
                self.destination.label(),
                e
            );
        }
    }
}
