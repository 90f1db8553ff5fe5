// ABOUTME: PostgreSQL connection setup for the destination database
// ABOUTME: TLS via native-tls, with retry on transient connect failures

use std::time::Duration;

use anyhow::{Context, Result};
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use tokio_postgres::Client;

use crate::utils::{retry_with_backoff, strip_password_from_url, validate_connection_string};

/// Open a connection to `url` and drive it on a background task.
///
/// TLS is offered to the server. Whether it is required follows the
/// `sslmode` parameter of the URL.
pub async fn connect(url: &str) -> Result<Client> {
    validate_connection_string(url)?;
    let display_url = strip_password_from_url(url).unwrap_or_else(|_| "<redacted>".to_string());

    let connector = TlsConnector::builder()
        .build()
        .context("Failed to build TLS connector")?;
    let tls = MakeTlsConnector::new(connector);

    let (client, connection) = tokio_postgres::connect(url, tls)
        .await
        .with_context(|| format!("Failed to connect to {}", display_url))?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!("PostgreSQL connection error: {}", e);
        }
    });

    tracing::debug!("Connected to {}", display_url);
    Ok(client)
}

/// [`connect`] with three retries starting at a one second delay.
pub async fn connect_with_retry(url: &str) -> Result<Client> {
    retry_with_backoff(|| connect(url), 3, Duration::from_secs(1)).await
}
