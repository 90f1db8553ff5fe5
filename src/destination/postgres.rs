// ABOUTME: PgDestination - writes adapted records into PostgreSQL via tokio-postgres
// ABOUTME: One transaction per batch, one savepoint per record for fault isolation

use std::collections::HashMap;
use std::error::Error as _;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Statement};

use crate::adapt::AdaptedRecord;
use crate::error::{RecordWriteError, SyncError};
use crate::schema::ColumnSpec;
use crate::utils::quote_ident;

use super::{Destination, InsertOutcome};

const RECORD_SAVEPOINT: &str = "record_write";

/// PostgreSQL destination bound to one schema (namespace).
///
/// Values are always bound as parameters. Only the schema, table, and
/// column identifiers are interpolated, and those come from the catalog.
///
/// Insert statements are prepared once per distinct column list and reused
/// for the rest of the batch.
pub struct PgDestination {
    client: Client,
    schema: String,
    label: String,
    in_transaction: bool,
    statements: HashMap<String, Statement>,
}

impl PgDestination {
    pub fn new(client: Client, schema: &str) -> Self {
        Self {
            client,
            schema: schema.to_string(),
            label: "postgres".to_string(),
            in_transaction: false,
            statements: HashMap::new(),
        }
    }

    /// Connect to `url` and target tables in `schema`.
    pub async fn connect(url: &str, schema: &str) -> Result<Self> {
        let client = crate::postgres::connect_with_retry(url)
            .await
            .context("Failed to connect to destination PostgreSQL")?;
        Ok(Self::new(client, schema))
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Number of insert statements prepared for the current batch.
    pub fn prepared_statements(&self) -> usize {
        self.statements.len()
    }

    async fn statement(&mut self, query: &str) -> Result<Statement, tokio_postgres::Error> {
        if let Some(statement) = self.statements.get(query) {
            return Ok(statement.clone());
        }
        let statement = self.client.prepare(query).await?;
        self.statements.insert(query.to_string(), statement.clone());
        Ok(statement)
    }

    async fn control(&self, table: &str, statement: &str) -> Result<(), SyncError> {
        self.client
            .batch_execute(statement)
            .await
            .map_err(|e| SyncError::batch_fatal(table, &self.label, describe_pg_error(&e)))
    }
}

#[async_trait]
impl Destination for PgDestination {
    fn label(&self) -> &str {
        &self.label
    }

    async fn table_columns(&mut self, table: &str) -> Result<Vec<ColumnSpec>> {
        let rows = self
            .client
            .query(
                "SELECT column_name, data_type, is_nullable, column_default
                 FROM information_schema.columns
                 WHERE table_schema = $1 AND table_name = $2
                 ORDER BY ordinal_position",
                &[&self.schema, &table],
            )
            .await
            .with_context(|| format!("Failed to get columns for {}.{}", self.schema, table))?;

        Ok(rows
            .iter()
            .map(|row| {
                let is_nullable: String = row.get(2);
                ColumnSpec {
                    name: row.get(0),
                    data_type: row.get(1),
                    nullable: is_nullable == "YES",
                    default_expr: row.get(3),
                }
            })
            .collect())
    }

    async fn begin(&mut self, table: &str) -> Result<(), SyncError> {
        // Column types may have changed since the last batch
        self.statements.clear();
        self.control(table, "BEGIN").await?;
        self.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self, table: &str) -> Result<(), SyncError> {
        // A failed COMMIT still ends the transaction server-side
        self.in_transaction = false;
        self.control(table, "COMMIT").await
    }

    async fn rollback(&mut self, table: &str) -> Result<(), SyncError> {
        self.in_transaction = false;
        self.control(table, "ROLLBACK").await
    }

    async fn delete_all(&mut self, table: &str) -> Result<u64, SyncError> {
        let sql = format!("DELETE FROM {}.{}", quote_ident(&self.schema), quote_ident(table));
        let deleted = self
            .client
            .execute(&sql, &[])
            .await
            .map_err(|e| SyncError::batch_fatal(table, &self.label, describe_pg_error(&e)))?;

        tracing::info!("Cleared {} rows from {}.{}", deleted, self.schema, table);
        Ok(deleted)
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

        let columns: Vec<&str> = record.columns().collect();
        let query = build_insert_query(&self.schema, table, &columns, on_conflict);
        let params: Vec<&(dyn ToSql + Sync)> = record
            .values()
            .map(|v| v as &(dyn ToSql + Sync))
            .collect();

        if self.in_transaction {
            self.control(table, &format!("SAVEPOINT {}", RECORD_SAVEPOINT))
                .await?;
        }

        // Preparing inside the savepoint keeps a failed prepare (e.g. a
        // conflict target without a matching constraint) confined to this record
        let executed = match self.statement(&query).await {
            Ok(statement) => self.client.execute(&statement, &params).await,
            Err(e) => Err(e),
        };

        match executed {
            Ok(affected) => {
                if self.in_transaction {
                    self.control(table, &format!("RELEASE SAVEPOINT {}", RECORD_SAVEPOINT))
                        .await?;
                }
                Ok(if affected == 0 {
                    InsertOutcome::Skipped
                } else {
                    InsertOutcome::Inserted
                })
            }
            Err(e) if e.is_closed() => Err(SyncError::batch_fatal(
                table,
                &self.label,
                describe_pg_error(&e),
            )),
            Err(e) => {
                if self.in_transaction {
                    self.control(
                        table,
                        &format!("ROLLBACK TO SAVEPOINT {}", RECORD_SAVEPOINT),
                    )
                    .await?;
                }
                Err(RecordWriteError::new(table, index, describe_pg_error(&e)).into())
            }
        }
    }

    async fn count_rows(&mut self, table: &str) -> Result<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {}.{}",
            quote_ident(&self.schema),
            quote_ident(table)
        );
        let row = self
            .client
            .query_one(&sql, &[])
            .await
            .with_context(|| format!("Failed to count rows in {}.{}", self.schema, table))?;
        Ok(row.get(0))
    }
}

/// Build a single-row insert naming only `columns`.
///
/// ```sql
/// INSERT INTO "schema"."table" ("a", "b") VALUES ($1, $2)
/// ON CONFLICT ("a") DO NOTHING
/// ```
pub(crate) fn build_insert_query(
    schema: &str,
    table: &str,
    columns: &[&str],
    on_conflict: Option<&[String]>,
) -> String {
    let quoted_columns: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${}", i)).collect();

    let mut query = format!(
        "INSERT INTO {}.{} ({}) VALUES ({})",
        quote_ident(schema),
        quote_ident(table),
        quoted_columns.join(", "),
        placeholders.join(", ")
    );

    match on_conflict {
        Some([]) => query.push_str(" ON CONFLICT DO NOTHING"),
        Some(keys) => {
            let quoted_keys: Vec<String> = keys.iter().map(|k| quote_ident(k)).collect();
            query.push_str(&format!(" ON CONFLICT ({}) DO NOTHING", quoted_keys.join(", ")));
        }
        None => {}
    }

    query
}

/// Render a tokio-postgres error with the server message or the
/// client-side cause (e.g. a parameter that could not be bound).
fn describe_pg_error(err: &tokio_postgres::Error) -> String {
    if let Some(db) = err.as_db_error() {
        return format!("{} (SQLSTATE {})", db.message(), db.code().code());
    }
    match err.source() {
        Some(cause) => format!("{}: {}", err, cause),
        None => err.to_string(),
    }
}
