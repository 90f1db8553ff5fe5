// ABOUTME: Destination abstraction for catalog reads, transactional writes, and counts
// ABOUTME: Implemented by PostgreSQL (tokio-postgres) and the cloud store REST API

pub mod postgres;
pub mod rest;

pub use postgres::PgDestination;
pub use rest::RestDestination;

use anyhow::Result;
use async_trait::async_trait;

use crate::adapt::AdaptedRecord;
use crate::error::SyncError;
use crate::schema::ColumnSpec;

/// Outcome of writing one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A row with the same conflict key already exists
    Skipped,
}

/// A relational destination a batch can be written to.
///
/// One destination is owned by one orchestrator and used strictly
/// sequentially: at most one batch transaction is open at a time.
#[async_trait]
pub trait Destination: Send {
    /// Short name used in logs and reports (e.g. `postgres`, `cloud`).
    fn label(&self) -> &str;

    /// Column metadata for `table` in catalog ordinal order; empty when the
    /// table does not exist.
    async fn table_columns(&mut self, table: &str) -> Result<Vec<ColumnSpec>>;

    /// Open the batch transaction.
    async fn begin(&mut self, table: &str) -> Result<(), SyncError>;

    async fn commit(&mut self, table: &str) -> Result<(), SyncError>;

    async fn rollback(&mut self, table: &str) -> Result<(), SyncError>;

    /// Delete every row of `table`, returning how many were removed.
    async fn delete_all(&mut self, table: &str) -> Result<u64, SyncError>;

    /// Insert one record naming only the columns it carries.
    ///
    /// With `on_conflict`, a uniqueness collision on those columns yields
    /// `InsertOutcome::Skipped`. A failure confined to this record must be
    /// returned as `SyncError::RecordWrite` and must leave the open
    /// transaction usable for the next record.
    async fn insert(
        &mut self,
        table: &str,
        index: usize,
        record: &AdaptedRecord,
        on_conflict: Option<&[String]>,
    ) -> Result<InsertOutcome, SyncError>;

    /// Rows of the current batch that stay written after `rollback`.
    fn unrevertable_writes(&self) -> u64 {
        0
    }

    async fn count_rows(&mut self, table: &str) -> Result<i64>;
}
