// ABOUTME: Error taxonomy for schema-adaptive synchronization
// ABOUTME: Separates table-level, batch-level, and record-level failures

use thiserror::Error;

/// Failure classes raised while syncing one table or batch.
///
/// None of these propagate past the orchestrator: each one is folded into the
/// `BatchResult` of the table it belongs to.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Table missing from the catalog, or the catalog query failed
    #[error("Schema unavailable for table '{table}': {reason}")]
    SchemaUnavailable { table: String, reason: String },

    /// A single record could not be written; the batch keeps going
    #[error(transparent)]
    RecordWrite(#[from] RecordWriteError),

    /// Connection or transaction failure that aborts the whole batch
    #[error("Batch for '{table}' on {destination} aborted: {reason}")]
    BatchFatal {
        table: String,
        destination: String,
        reason: String,
    },
}

impl SyncError {
    pub fn schema_unavailable(table: &str, reason: impl Into<String>) -> Self {
        Self::SchemaUnavailable {
            table: table.to_string(),
            reason: reason.into(),
        }
    }

    pub fn batch_fatal(table: &str, destination: &str, reason: impl Into<String>) -> Self {
        Self::BatchFatal {
            table: table.to_string(),
            destination: destination.to_string(),
            reason: reason.into(),
        }
    }

    /// True when the error only affects the record being written.
    pub fn is_record_level(&self) -> bool {
        matches!(self, Self::RecordWrite(_))
    }
}

/// One record's insert failure (constraint violation, type mismatch, ...).
#[derive(Debug, Clone, Error, PartialEq, Eq, serde::Serialize)]
#[error("Failed to write record #{index} into '{table}': {message}")]
pub struct RecordWriteError {
    pub table: String,
    /// Position of the record within its batch
    pub index: usize,
    pub message: String,
}

impl RecordWriteError {
    pub fn new(table: &str, index: usize, message: impl Into<String>) -> Self {
        Self {
            table: table.to_string(),
            index,
            message: message.into(),
        }
    }
}
