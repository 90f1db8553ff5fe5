// ABOUTME: SchemaIntrospector - reads a destination table's real column set
// ABOUTME: Maps missing tables and catalog failures to SchemaUnavailable

use crate::destination::Destination;
use crate::error::SyncError;
use crate::utils::validate_postgres_identifier;

use super::TableSchema;

/// Reads column metadata (name, type, nullability, default) from a
/// destination's catalog.
///
/// Introspection is read-only, so calling it repeatedly for the same table
/// yields the same schema and leaves the destination untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaIntrospector;

impl SchemaIntrospector {
    pub fn new() -> Self {
        Self
    }

    /// Introspect `table` on `destination`.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::SchemaUnavailable` when the table name is not a
    /// valid identifier, the catalog query fails, or the catalog has no
    /// columns for the table (it does not exist).
    pub async fn introspect<D>(&self, destination: &mut D, table: &str) -> Result<TableSchema, SyncError>
    where
        D: Destination + ?Sized,
    {
        validate_postgres_identifier(table)
            .map_err(|e| SyncError::schema_unavailable(table, format!("{:#}", e)))?;

        let columns = destination.table_columns(table).await.map_err(|e| {
            SyncError::schema_unavailable(
                table,
                format!("catalog query on {} failed: {:#}", destination.label(), e),
            )
        })?;

        if columns.is_empty() {
            return Err(SyncError::schema_unavailable(
                table,
                format!("table does not exist on {}", destination.label()),
            ));
        }

        let schema = TableSchema::new(table, columns);
        tracing::info!(
            "Columns of '{}' on {}: {:?}",
            table,
            destination.label(),
            schema.column_names()
        );

        Ok(schema)
    }
}
