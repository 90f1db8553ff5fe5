// ABOUTME: Record producers - the sources a sync pass reads raw records from
// ABOUTME: Cloud store tables and paginated HTML listings

pub mod cloud;
pub mod listing;

pub use cloud::CloudStore;
pub use listing::{extract_listing, ListingScraper};

use anyhow::Result;
use async_trait::async_trait;

use crate::adapt::RawRecord;

/// Yields the ordered raw records of a named source.
///
/// "No data" is an empty vector, never an error. Errors are reserved for
/// connectivity and authentication failures.
#[async_trait]
pub trait RecordProducer: Send + Sync {
    async fn fetch_all(&self, source: &str) -> Result<Vec<RawRecord>>;
}
