// ABOUTME: RecordAdapter - conforms raw records to an introspected table schema
// ABOUTME: Drops unknown fields and substitutes values for nulls in NOT NULL columns

use std::collections::BTreeMap;

use serde::Serialize;

use crate::schema::TableSchema;

use super::{AdaptedRecord, FieldValue, RawRecord};

/// Non-fatal diagnostic: a source field has no matching destination column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdaptationWarning {
    pub table: String,
    pub column: String,
}

/// Result of adapting one record.
#[derive(Debug, Clone, PartialEq)]
pub struct Adaptation {
    pub record: AdaptedRecord,
    pub warnings: Vec<AdaptationWarning>,
}

/// Result of adapting a whole batch.
#[derive(Debug, Clone, Default)]
pub struct AdaptedBatch {
    pub records: Vec<AdaptedRecord>,
    /// Dropped column name -> number of records that carried it
    pub dropped_columns: BTreeMap<String, usize>,
}

/// Adapt one raw record to `schema`.
///
/// - fields that are not columns of `schema` are dropped with a warning
/// - `Null` in a NOT NULL column becomes the column's default expression
///   text, or the empty string when it has none; the column type is not
///   consulted
/// - every other value is copied unchanged
/// - columns missing from `raw` stay missing
pub fn adapt(raw: &RawRecord, schema: &TableSchema) -> Adaptation {
    let mut values = BTreeMap::new();
    let mut warnings = Vec::new();

    for (field, value) in raw.iter() {
        let Some(column) = schema.column(field) else {
            warnings.push(AdaptationWarning {
                table: schema.table().to_string(),
                column: field.to_string(),
            });
            continue;
        };

        let adapted = if value.is_null() && !column.nullable {
            FieldValue::Text(column.default_expr.clone().unwrap_or_default())
        } else {
            value.clone()
        };
        values.insert(field.to_string(), adapted);
    }

    Adaptation {
        record: AdaptedRecord::from_checked(values),
        warnings,
    }
}

/// Adapts batches of records against one table schema.
pub struct RecordAdapter<'a> {
    schema: &'a TableSchema,
}

impl<'a> RecordAdapter<'a> {
    pub fn new(schema: &'a TableSchema) -> Self {
        Self { schema }
    }

    pub fn adapt(&self, raw: &RawRecord) -> Adaptation {
        adapt(raw, self.schema)
    }

    /// Adapt every record, keeping input order.
    ///
    /// Dropped columns are reported once per column rather than once per
    /// record.
    pub fn adapt_all(&self, raws: &[RawRecord]) -> AdaptedBatch {
        let mut batch = AdaptedBatch {
            records: Vec::with_capacity(raws.len()),
            ..AdaptedBatch::default()
        };

        for raw in raws {
            let adaptation = self.adapt(raw);
            for warning in adaptation.warnings {
                *batch.dropped_columns.entry(warning.column).or_insert(0) += 1;
            }
            batch.records.push(adaptation.record);
        }

        for (column, count) in &batch.dropped_columns {
            tracing::warn!(
                "Column '{}' does not exist in '{}', dropped from {} record(s)",
                column,
                self.schema.table(),
                count
            );
        }

        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnSpec;

    fn schema(columns: Vec<ColumnSpec>) -> TableSchema {
        TableSchema::new("t", columns)
    }

    #[test]
    fn test_null_in_not_null_column_takes_default() {
        let s = schema(vec![
            ColumnSpec::new("id", "text", false, Some("0")),
            ColumnSpec::new("name", "text", true, None),
        ]);
        let raw = RawRecord::new().with("id", FieldValue::Null).with("name", "Ana");

        let adapted = adapt(&raw, &s);

        assert!(adapted.warnings.is_empty());
        assert_eq!(adapted.record.get("id"), Some(&FieldValue::text("0")));
        assert_eq!(adapted.record.get("name"), Some(&FieldValue::text("Ana")));
    }

    #[test]
    fn test_null_in_not_null_column_without_default_becomes_empty_string() {
        let s = schema(vec![ColumnSpec::new("count", "integer", false, None)]);
        let raw = RawRecord::new().with("count", FieldValue::Null);

        let adapted = adapt(&raw, &s);

        // Not type-aware: the write decides whether '' fits the column
        assert_eq!(adapted.record.get("count"), Some(&FieldValue::text("")));
    }

    #[test]
    fn test_null_in_nullable_column_is_kept() {
        let s = schema(vec![ColumnSpec::new("email", "text", true, Some("'x'::text"))]);
        let raw = RawRecord::new().with("email", FieldValue::Null);

        assert_eq!(adapt(&raw, &s).record.get("email"), Some(&FieldValue::Null));
    }

    #[test]
    fn test_unknown_field_dropped_and_missing_column_not_backfilled() {
        let s = schema(vec![
            ColumnSpec::new("id", "integer", false, None),
            ColumnSpec::new("extra", "text", true, None),
        ]);
        let raw = RawRecord::new().with("id", 5i64).with("ghost", "x");

        let adapted = adapt(&raw, &s);

        assert_eq!(adapted.record.columns().collect::<Vec<_>>(), vec!["id"]);
        assert_eq!(adapted.record.get("id"), Some(&FieldValue::Integer(5)));
        assert_eq!(
            adapted.warnings,
            vec![AdaptationWarning {
                table: "t".to_string(),
                column: "ghost".to_string()
            }]
        );
    }

    #[test]
    fn test_empty_record_adapts_to_empty() {
        let s = schema(vec![ColumnSpec::new("id", "integer", false, None)]);
        let adapted = adapt(&RawRecord::new(), &s);
        assert!(adapted.record.is_empty());
        assert!(adapted.warnings.is_empty());
    }

    #[test]
    fn test_adapted_keys_subset_of_schema_and_no_null_in_not_null() {
        let s = schema(vec![
            ColumnSpec::new("a", "text", false, None),
            ColumnSpec::new("b", "text", true, None),
            ColumnSpec::new("c", "text", false, Some("'c'")),
        ]);
        let raws = vec![
            RawRecord::new().with("a", FieldValue::Null).with("z", 1i64),
            RawRecord::new().with("b", FieldValue::Null).with("c", FieldValue::Null),
            RawRecord::new().with("a", "x").with("b", "y").with("c", "w").with("q", false),
        ];

        for raw in &raws {
            let adapted = adapt(raw, &s).record;
            for (column, value) in adapted.iter() {
                let spec = s.column(column).expect("adapted key must be a schema column");
                assert!(spec.nullable || !value.is_null());
            }
        }
    }

    #[test]
    fn test_adapt_all_counts_dropped_columns() {
        let s = schema(vec![ColumnSpec::new("nome", "text", false, None)]);
        let adapter = RecordAdapter::new(&s);
        let raws = vec![
            RawRecord::new().with("nome", "A").with("legacy", 1i64),
            RawRecord::new().with("nome", "B").with("legacy", 2i64).with("old", "x"),
        ];

        let batch = adapter.adapt_all(&raws);

        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.dropped_columns.get("legacy"), Some(&2));
        assert_eq!(batch.dropped_columns.get("old"), Some(&1));
    }
}
