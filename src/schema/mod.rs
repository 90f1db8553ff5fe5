// ABOUTME: Column metadata model for destination tables
// ABOUTME: Exposes ColumnSpec/TableSchema and the catalog introspector

pub mod introspector;

pub use introspector::SchemaIntrospector;

use serde::Serialize;

/// Metadata for one destination column, as declared in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSpec {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    /// Default expression exactly as the catalog reports it (e.g. `'0'::text`)
    pub default_expr: Option<String>,
}

impl ColumnSpec {
    pub fn new(name: &str, data_type: &str, nullable: bool, default_expr: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            data_type: data_type.to_string(),
            nullable,
            default_expr: default_expr.map(str::to_string),
        }
    }
}

/// The introspected column set of one table, in catalog ordinal order.
///
/// Fixed for the duration of a run; the engine never alters it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    table: String,
    columns: Vec<ColumnSpec>,
}

impl TableSchema {
    pub fn new(table: &str, columns: Vec<ColumnSpec>) -> Self {
        Self {
            table: table.to_string(),
            columns,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
