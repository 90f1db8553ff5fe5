// ABOUTME: HTTP client for the managed cloud store's PostgREST-style API
// ABOUTME: Handles paged selects, single-row inserts, row counts, and table metadata

use std::error::Error as _;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde_json::Value as JsonValue;

use super::models::{parse_content_range_total, OpenApiDocument};
use crate::schema::ColumnSpec;

/// Result of posting one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowInsert {
    Inserted,
    /// Ignored as a duplicate of an existing row
    Skipped,
    /// The API refused this row (constraint, type, payload)
    Rejected { status: StatusCode, body: String },
    /// No usable answer for this row; whether it was stored is unknown
    Failed { message: String },
}

pub struct CloudClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl CloudClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    /// Fail on authentication errors and any other non-success status.
    async fn check(response: Response, what: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            bail!(
                "{} failed: authentication rejected ({}). Check the cloud store API key",
                what,
                status
            );
        }
        bail!("{} failed with status {}: {}", what, status, body);
    }

    /// Fetch one page of rows, ordered by `order` when given.
    pub async fn select_page(
        &self,
        table: &str,
        order: &[String],
        offset: usize,
        limit: usize,
    ) -> Result<Vec<JsonValue>> {
        let mut query = vec![
            ("select", "*".to_string()),
            ("offset", offset.to_string()),
            ("limit", limit.to_string()),
        ];
        if !order.is_empty() {
            let keys: Vec<String> = order.iter().map(|k| format!("{}.asc", k)).collect();
            query.push(("order", keys.join(",")));
        }
        let request = self.client.get(self.table_url(table)).query(&query);

        let response = self
            .authorized(request)
            .send()
            .await
            .with_context(|| format!("Failed to query table '{}' from the cloud store", table))?;
        let response = Self::check(response, &format!("Select from '{}'", table)).await?;

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse rows of '{}'", table))
    }

    /// Fetch every row of `table`.
    ///
    /// Pages are ordered by the table's primary key (or `id`) and requested
    /// until an empty page or the exact row count is reached. The server may
    /// return fewer rows than asked for, so a short page is not the end.
    /// Fails when the rows read differ from the count.
    pub async fn select_all(&self, table: &str, page_size: usize) -> Result<Vec<JsonValue>> {
        let page_size = page_size.max(1);
        let total = self.count(table).await?;
        let order = self.paging_order(table).await?;
        if order.is_empty() {
            tracing::warn!(
                "'{}' has no primary key or id column; paging without a stable order",
                table
            );
        }

        let mut rows = Vec::new();
        while (rows.len() as i64) < total {
            let page = self.select_page(table, &order, rows.len(), page_size).await?;
            if page.is_empty() {
                break;
            }
            rows.extend(page);
            tracing::debug!("Fetched {} of {} rows of '{}'", rows.len(), total, table);
        }

        if rows.len() as i64 != total {
            bail!(
                "Read {} rows of '{}' but the cloud store reports {}; the table changed during the read or paging is broken",
                rows.len(),
                table,
                total
            );
        }
        Ok(rows)
    }

    /// Insert one row. With `on_conflict`, duplicates on those columns are
    /// ignored and reported as `RowInsert::Skipped`.
    ///
    /// Only an authentication failure is an error. A refused row is
    /// `RowInsert::Rejected`, and a request that timed out, could not be sent,
    /// or got an unreadable answer is `RowInsert::Failed`.
    pub async fn insert_row<T: Serialize + ?Sized>(
        &self,
        table: &str,
        row: &T,
        on_conflict: Option<&[String]>,
    ) -> Result<RowInsert> {
        let mut request = self.client.post(self.table_url(table)).json(row);
        let prefer = match on_conflict {
            Some(keys) => {
                if !keys.is_empty() {
                    request = request.query(&[("on_conflict", keys.join(","))]);
                }
                "return=representation,resolution=ignore-duplicates"
            }
            None => "return=representation",
        };

        let response = match self
            .authorized(request.header("Prefer", prefer))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                return Ok(RowInsert::Failed {
                    message: describe_request_error("insert request", &e),
                })
            }
        };

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            bail!("Insert into '{}' rejected: authentication failed ({})", table, status);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Ok(RowInsert::Rejected { status, body });
        }

        // The row may be stored even when the answer cannot be read
        let returned: Vec<JsonValue> = match response.json().await {
            Ok(returned) => returned,
            Err(e) => {
                return Ok(RowInsert::Failed {
                    message: describe_request_error(
                        &format!("insert answered {} but the response", status),
                        &e,
                    ),
                })
            }
        };

        Ok(if returned.is_empty() {
            RowInsert::Skipped
        } else {
            RowInsert::Inserted
        })
    }

    /// Exact row count via `Prefer: count=exact`.
    pub async fn count(&self, table: &str) -> Result<i64> {
        let request = self
            .client
            .head(self.table_url(table))
            .query(&[("select", "*")])
            .header("Prefer", "count=exact");

        let response = self
            .authorized(request)
            .send()
            .await
            .with_context(|| format!("Failed to count rows of '{}'", table))?;
        let response = Self::check(response, &format!("Count of '{}'", table)).await?;

        let header = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .with_context(|| format!("Count of '{}' returned no Content-Range header", table))?;

        parse_content_range_total(header)
            .with_context(|| format!("Unexpected Content-Range '{}' for '{}'", header, table))
    }

    async fn api_description(&self) -> Result<OpenApiDocument> {
        let request = self
            .client
            .get(format!("{}/rest/v1/", self.base_url))
            .header("Accept", "application/openapi+json");

        let response = self
            .authorized(request)
            .send()
            .await
            .context("Failed to fetch the cloud store API description")?;
        let response = Self::check(response, "API description request").await?;

        response
            .json()
            .await
            .context("Failed to parse the cloud store API description")
    }

    /// Column metadata for `table` from the API's OpenAPI document; empty
    /// when the table is not exposed.
    pub async fn table_columns(&self, table: &str) -> Result<Vec<ColumnSpec>> {
        let document = self.api_description().await?;
        Ok(document
            .definitions
            .get(table)
            .map(|definition| definition.to_columns())
            .unwrap_or_default())
    }

    /// Columns to order paged reads of `table` by.
    pub async fn paging_order(&self, table: &str) -> Result<Vec<String>> {
        let document = self.api_description().await?;
        Ok(document
            .definitions
            .get(table)
            .map(|definition| definition.paging_order())
            .unwrap_or_default())
    }
}

/// `what` plus the error and its causes, e.g. a connection refusal.
fn describe_request_error(what: &str, err: &reqwest::Error) -> String {
    if err.is_timeout() {
        return format!("{} timed out", what);
    }
    let mut message = format!("{} failed: {}", what, err);
    let mut cause = err.source();
    while let Some(inner) = cause {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        cause = inner.source();
    }
    message
}
