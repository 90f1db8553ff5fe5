// ABOUTME: Command implementations for the CLI subcommands
// ABOUTME: Exports migrate, scrape, and verify

pub mod migrate;
pub mod scrape;
pub mod verify;

pub use migrate::migrate;
pub use scrape::scrape;
pub use verify::verify;

use std::time::Duration;

use anyhow::{Context, Result};

use crate::cloud::CloudClient;

/// Credentials for the managed cloud store.
#[derive(Clone)]
pub struct CloudCredentials {
    pub url: String,
    pub key: String,
}

impl CloudCredentials {
    pub fn client(&self, timeout: Duration) -> Result<CloudClient> {
        CloudClient::new(&self.url, &self.key, timeout)
            .with_context(|| format!("Failed to set up cloud store client for {}", self.url))
    }
}
