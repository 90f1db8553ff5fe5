// ABOUTME: RestDestination - writes adapted records to the cloud store over HTTP
// ABOUTME: Non-transactional; supports upsert-skip writes but not replace mode

use anyhow::Result;
use async_trait::async_trait;

use crate::adapt::AdaptedRecord;
use crate::cloud::{CloudClient, RowInsert};
use crate::error::{RecordWriteError, SyncError};
use crate::schema::ColumnSpec;

use super::{Destination, InsertOutcome};

/// Cloud store destination.
///
/// Every request commits on its own, so `begin`/`commit` only track the
/// batch and `rollback` can merely report what was already applied. A row
/// whose request fails is a record-level failure; only rejected credentials
/// abort the batch.
pub struct RestDestination {
    client: CloudClient,
    label: String,
    applied_in_batch: u64,
}

impl RestDestination {
    pub fn new(client: CloudClient) -> Self {
        Self {
            client,
            label: "cloud".to_string(),
            applied_in_batch: 0,
        }
    }
}

#[async_trait]
impl Destination for RestDestination {
    fn label(&self) -> &str {
        &self.label
    }

    async fn table_columns(&mut self, table: &str) -> Result<Vec<ColumnSpec>> {
        self.client.table_columns(table).await
    }

    async fn begin(&mut self, _table: &str) -> Result<(), SyncError> {
        self.applied_in_batch = 0;
        Ok(())
    }

    async fn commit(&mut self, table: &str) -> Result<(), SyncError> {
        tracing::debug!(
            "{} rows applied to '{}' on {}",
            self.applied_in_batch,
            table,
            self.label
        );
        Ok(())
    }

    async fn rollback(&mut self, table: &str) -> Result<(), SyncError> {
        if self.applied_in_batch > 0 {
            tracing::warn!(
                "{} rows already written to '{}' on {} cannot be rolled back",
                self.applied_in_batch,
                table,
                self.label
            );
        }
        Ok(())
    }

    async fn delete_all(&mut self, table: &str) -> Result<u64, SyncError> {
        Err(SyncError::batch_fatal(
            table,
            &self.label,
            "replace mode needs a transactional destination; the REST API cannot clear tables atomically",
        ))
    }

    async fn insert(
        &mut self,
        table: &str,
        index: usize,
        record: &AdaptedRecord,
        on_conflict: Option<&[String]>,
    ) -> Result<InsertOutcome, SyncError> {
        if record.is_empty() {
            return Err(RecordWriteError::new(
                table,
                index,
                "record has no fields matching the table columns",
            )
            .into());
        }

        // insert_row only errors when the credentials are refused
        let result = self
            .client
            .insert_row(table, record, on_conflict)
            .await
            .map_err(|e| SyncError::batch_fatal(table, &self.label, format!("{:#}", e)))?;

        match result {
            RowInsert::Inserted => {
                self.applied_in_batch += 1;
                Ok(InsertOutcome::Inserted)
            }
            RowInsert::Skipped => Ok(InsertOutcome::Skipped),
            RowInsert::Rejected { status, body } => Err(RecordWriteError::new(
                table,
                index,
                format!("rejected with status {}: {}", status, body),
            )
            .into()),
            RowInsert::Failed { message } => {
                Err(RecordWriteError::new(table, index, message).into())
            }
        }
    }

    fn unrevertable_writes(&self) -> u64 {
        self.applied_in_batch
    }

    async fn count_rows(&mut self, table: &str) -> Result<i64> {
        self.client.count(table).await
    }
}
