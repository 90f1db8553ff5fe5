// ABOUTME: CloudStore producer - reads whole tables from the managed cloud store
// ABOUTME: Converts each returned JSON row into a RawRecord

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::adapt::RawRecord;
use crate::cloud::CloudClient;

use super::RecordProducer;

/// The API caps responses at 1000 rows by default
pub const DEFAULT_PAGE_SIZE: usize = 1000;

pub struct CloudStore {
    client: CloudClient,
    page_size: usize,
}

impl CloudStore {
    pub fn new(client: CloudClient) -> Self {
        Self {
            client,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

#[async_trait]
impl RecordProducer for CloudStore {
    async fn fetch_all(&self, table: &str) -> Result<Vec<RawRecord>> {
        let rows = self.client.select_all(table, self.page_size).await?;

        rows.into_iter()
            .enumerate()
            .map(|(i, row)| {
                RawRecord::from_json(row)
                    .with_context(|| format!("Row {} of '{}' is not an object", i, table))
            })
            .collect()
    }
}
