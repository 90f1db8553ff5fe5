// ABOUTME: RawRecord and AdaptedRecord - source rows before and after adaptation
// ABOUTME: AdaptedRecord can only be built by the adapter, keeping its invariants

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::FieldValue;

/// A record exactly as a producer yielded it: field name to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord {
    fields: BTreeMap<String, FieldValue>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, used by producers and tests.
    pub fn with(mut self, field: &str, value: impl Into<FieldValue>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: &str, value: impl Into<FieldValue>) {
        self.fields.insert(field.to_string(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Convert a JSON object (one cloud-store row) into a record.
    pub fn from_json(value: JsonValue) -> Result<Self> {
        let JsonValue::Object(map) = value else {
            bail!("Expected a JSON object for a record, got: {}", value);
        };
        Ok(Self {
            fields: map
                .into_iter()
                .map(|(k, v)| (k, FieldValue::from(v)))
                .collect(),
        })
    }
}

impl FromIterator<(String, FieldValue)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// A record conformed to a table schema.
///
/// Every key is a column of the schema it was adapted against, and no
/// non-nullable column holds `Null`. Columns the source did not provide are
/// absent rather than back-filled, so writers must always name columns
/// explicitly.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AdaptedRecord {
    values: BTreeMap<String, FieldValue>,
}

impl AdaptedRecord {
    /// Only the adapter in this module tree may construct records.
    pub(super) fn from_checked(values: BTreeMap<String, FieldValue>) -> Self {
        Self { values }
    }

    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.values.get(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &FieldValue> {
        self.values.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_raw_record_from_json_object() {
        let record = RawRecord::from_json(json!({"id": 1, "nome": "Escola A", "ativo": null})).unwrap();
        assert_eq!(record.len(), 3);
        assert_eq!(record.get("id"), Some(&FieldValue::Integer(1)));
        assert_eq!(record.get("ativo"), Some(&FieldValue::Null));
    }

    #[test]
    fn test_raw_record_rejects_non_objects() {
        assert!(RawRecord::from_json(json!([1, 2])).is_err());
    }

    #[test]
    fn test_raw_record_serializes_as_plain_object() {
        let record = RawRecord::new().with("nome", "Escola A").with("publica", true);
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({"nome": "Escola A", "publica": true})
        );
    }
}
