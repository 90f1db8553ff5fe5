// ABOUTME: ConsistencyVerifier - post-write row count check per destination
// ABOUTME: Classifies a written batch as succeeded or mismatched

use anyhow::{Context, Result};

use crate::destination::Destination;
use crate::sync::BatchStatus;

/// Reads row counts after a batch has been committed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsistencyVerifier;

impl ConsistencyVerifier {
    pub fn new() -> Self {
        Self
    }

    /// Current row count of `table`. Read-only.
    pub async fn verify<D>(&self, destination: &mut D, table: &str) -> Result<i64>
    where
        D: Destination + ?Sized,
    {
        let label = destination.label().to_string();
        destination
            .count_rows(table)
            .await
            .with_context(|| format!("Failed to verify row count of '{}' on {}", table, label))
    }

    /// `Succeeded` only when the verified count equals the inserted count.
    pub fn classify(inserted: u64, verified: i64) -> BatchStatus {
        if i64::try_from(inserted).is_ok_and(|inserted| inserted == verified) {
            BatchStatus::Succeeded
        } else {
            BatchStatus::Mismatched
        }
    }
}
