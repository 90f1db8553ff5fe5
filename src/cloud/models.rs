// ABOUTME: Data models for the cloud store REST API responses
// ABOUTME: OpenAPI table definitions used for column introspection

use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;

use crate::schema::ColumnSpec;

/// The subset of the PostgREST OpenAPI document we read.
#[derive(Debug, Deserialize)]
pub struct OpenApiDocument {
    #[serde(default)]
    pub definitions: HashMap<String, TableDefinition>,
}

#[derive(Debug, Deserialize)]
pub struct TableDefinition {
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub properties: HashMap<String, PropertyDefinition>,
}

#[derive(Debug, Deserialize)]
pub struct PropertyDefinition {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub format: Option<String>,
    pub default: Option<JsonValue>,
    /// PostgREST appends `<pk/>` here for primary key columns
    pub description: Option<String>,
}

impl PropertyDefinition {
    fn is_primary_key(&self) -> bool {
        self.description
            .as_deref()
            .is_some_and(|d| d.contains("<pk/>"))
    }
}

impl TableDefinition {
    /// Column specs sorted by name (the document carries no ordinal order).
    ///
    /// PostgREST lists NOT NULL columns without a default as `required`,
    /// so a NOT NULL column that has a default is reported as nullable.
    pub fn to_columns(&self) -> Vec<ColumnSpec> {
        let mut columns: Vec<ColumnSpec> = self
            .properties
            .iter()
            .map(|(name, prop)| ColumnSpec {
                name: name.clone(),
                data_type: prop
                    .format
                    .clone()
                    .or_else(|| prop.kind.clone())
                    .unwrap_or_else(|| "unknown".to_string()),
                nullable: !self.required.contains(name),
                default_expr: prop.default.as_ref().map(|d| match d {
                    JsonValue::String(s) => s.clone(),
                    other => other.to_string(),
                }),
            })
            .collect();
        columns.sort_by(|a, b| a.name.cmp(&b.name));
        columns
    }

    /// Primary key columns, sorted by name.
    pub fn primary_key(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .properties
            .iter()
            .filter(|(_, prop)| prop.is_primary_key())
            .map(|(name, _)| name.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Columns that give paged reads a stable order: the primary key, else
    /// an `id` column. Empty when neither exists.
    pub fn paging_order(&self) -> Vec<String> {
        let keys = self.primary_key();
        if !keys.is_empty() {
            return keys;
        }
        if self.properties.contains_key("id") {
            return vec!["id".to_string()];
        }
        Vec::new()
    }
}

/// Parse the total from a `Content-Range` header such as `0-24/25` or `*/0`.
pub fn parse_content_range_total(header: &str) -> Option<i64> {
    header.rsplit_once('/')?.1.trim().parse().ok()
}
