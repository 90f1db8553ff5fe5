// ABOUTME: In-memory destination and producer shared by the integration tests
// ABOUTME: Snapshot-based transactions, unique keys, and typed integer columns

#![allow(dead_code)]

pub mod http;

use std::collections::{BTreeMap, HashMap, HashSet};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use adaptive_replicator::adapt::{AdaptedRecord, FieldValue, RawRecord};
use adaptive_replicator::destination::{Destination, InsertOutcome};
use adaptive_replicator::error::{RecordWriteError, SyncError};
use adaptive_replicator::schema::ColumnSpec;
use adaptive_replicator::source::RecordProducer;

type Row = BTreeMap<String, FieldValue>;

#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    pub columns: Vec<ColumnSpec>,
    pub rows: Vec<Row>,
    /// Columns of the table's unique constraint, if any
    pub unique: Vec<String>,
}

impl MemoryTable {
    pub fn new(columns: Vec<ColumnSpec>) -> Self {
        Self {
            columns,
            ..Self::default()
        }
    }

    pub fn with_unique(mut self, columns: &[&str]) -> Self {
        self.unique = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// A destination that behaves like a small transactional database.
///
/// `begin` snapshots every table and `rollback` restores the snapshot.
/// `integer` columns reject text that does not parse as a number.
#[derive(Debug, Default)]
pub struct MemoryDestination {
    pub label: String,
    pub tables: BTreeMap<String, MemoryTable>,
    snapshot: Option<BTreeMap<String, MemoryTable>>,
    /// Tables whose catalog read errors out
    pub broken_catalog: HashSet<String>,
    /// Forced results for `count_rows`
    pub count_overrides: HashMap<String, i64>,
    /// Tables whose count read errors out
    pub broken_count: HashSet<String>,
    /// Record index at which the connection "drops"
    pub fatal_at: Option<usize>,
    pub commits: usize,
    pub rollbacks: usize,
}

impl MemoryDestination {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            ..Self::default()
        }
    }

    pub fn with_table(mut self, name: &str, table: MemoryTable) -> Self {
        self.tables.insert(name.to_string(), table);
        self
    }

    pub fn rows(&self, table: &str) -> &[Row] {
        self.tables.get(table).map(|t| t.rows.as_slice()).unwrap_or(&[])
    }

    fn check_value(column: &ColumnSpec, value: &FieldValue) -> Result<(), String> {
        if column.data_type != "integer" {
            return Ok(());
        }
        match value {
            FieldValue::Null | FieldValue::Integer(_) => Ok(()),
            FieldValue::Text(text) if text.trim().parse::<i64>().is_ok() => Ok(()),
            other => Err(format!(
                "invalid input syntax for type integer: \"{}\"",
                other
            )),
        }
    }
}

#[async_trait]
impl Destination for MemoryDestination {
    fn label(&self) -> &str {
        &self.label
    }

    async fn table_columns(&mut self, table: &str) -> Result<Vec<ColumnSpec>> {
        if self.broken_catalog.contains(table) {
            bail!("catalog query failed for {}", table);
        }
        Ok(self
            .tables
            .get(table)
            .map(|t| t.columns.clone())
            .unwrap_or_default())
    }

    async fn begin(&mut self, _table: &str) -> Result<(), SyncError> {
        self.snapshot = Some(self.tables.clone());
        Ok(())
    }

    async fn commit(&mut self, _table: &str) -> Result<(), SyncError> {
        self.snapshot = None;
        self.commits += 1;
        Ok(())
    }

    async fn rollback(&mut self, _table: &str) -> Result<(), SyncError> {
        if let Some(snapshot) = self.snapshot.take() {
            self.tables = snapshot;
        }
        self.rollbacks += 1;
        Ok(())
    }

    async fn delete_all(&mut self, table: &str) -> Result<u64, SyncError> {
        let Some(target) = self.tables.get_mut(table) else {
            return Err(SyncError::batch_fatal(table, &self.label, "no such table"));
        };
        let deleted = target.rows.len() as u64;
        target.rows.clear();
        Ok(deleted)
    }

    async fn insert(
        &mut self,
        table: &str,
        index: usize,
        record: &AdaptedRecord,
        on_conflict: Option<&[String]>,
    ) -> Result<InsertOutcome, SyncError> {
        if self.fatal_at == Some(index) {
            return Err(SyncError::batch_fatal(table, &self.label, "connection closed"));
        }

        let label = self.label.clone();
        let target = self
            .tables
            .get_mut(table)
            .ok_or_else(|| SyncError::batch_fatal(table, &label, "no such table"))?;

        let mut row = Row::new();
        for (name, value) in record.iter() {
            let column = target.column(name).ok_or_else(|| {
                RecordWriteError::new(table, index, format!("column \"{}\" does not exist", name))
            })?;
            Self::check_value(column, value)
                .map_err(|message| RecordWriteError::new(table, index, message))?;
            row.insert(name.to_string(), value.clone());
        }

        for column in &target.columns {
            let missing = row.get(&column.name).map_or(true, FieldValue::is_null);
            if !column.nullable && column.default_expr.is_none() && missing {
                return Err(RecordWriteError::new(
                    table,
                    index,
                    format!("null value in column \"{}\" violates not-null constraint", column.name),
                )
                .into());
            }
        }

        if !target.unique.is_empty() {
            let key = |r: &Row| -> Vec<Option<FieldValue>> {
                target.unique.iter().map(|c| r.get(c).cloned()).collect()
            };
            let new_key = key(&row);
            if target.rows.iter().any(|existing| key(existing) == new_key) {
                return match on_conflict {
                    Some(_) => Ok(InsertOutcome::Skipped),
                    None => Err(RecordWriteError::new(
                        table,
                        index,
                        "duplicate key value violates unique constraint",
                    )
                    .into()),
                };
            }
        }

        target.rows.push(row);
        Ok(InsertOutcome::Inserted)
    }

    async fn count_rows(&mut self, table: &str) -> Result<i64> {
        if self.broken_count.contains(table) {
            bail!("count query failed for {}", table);
        }
        if let Some(count) = self.count_overrides.get(table) {
            return Ok(*count);
        }
        self.tables
            .get(table)
            .map(|t| t.rows.len() as i64)
            .ok_or_else(|| anyhow!("relation \"{}\" does not exist", table))
    }
}

/// Serves fixed record sets by name.
#[derive(Debug, Default)]
pub struct MemoryProducer {
    pub sources: HashMap<String, Vec<RawRecord>>,
    pub unreachable: HashSet<String>,
}

impl MemoryProducer {
    pub fn with_source(mut self, name: &str, records: Vec<RawRecord>) -> Self {
        self.sources.insert(name.to_string(), records);
        self
    }
}

#[async_trait]
impl RecordProducer for MemoryProducer {
    async fn fetch_all(&self, source: &str) -> Result<Vec<RawRecord>> {
        if self.unreachable.contains(source) {
            bail!("connection refused while reading {}", source);
        }
        Ok(self.sources.get(source).cloned().unwrap_or_default())
    }
}

/// `cursos(id integer not null, nome text not null, vagas integer null)`
pub fn cursos_table() -> MemoryTable {
    MemoryTable::new(vec![
        ColumnSpec::new("id", "integer", false, None),
        ColumnSpec::new("nome", "text", false, None),
        ColumnSpec::new("vagas", "integer", true, None),
    ])
}

/// `escolas(nome, municipio, uf, rede, publica)` unique on (nome, municipio, uf)
pub fn escolas_table() -> MemoryTable {
    MemoryTable::new(vec![
        ColumnSpec::new("id", "integer", false, Some("nextval('escolas_id_seq'::regclass)")),
        ColumnSpec::new("nome", "text", false, None),
        ColumnSpec::new("municipio", "text", false, None),
        ColumnSpec::new("uf", "text", false, None),
        ColumnSpec::new("rede", "text", true, None),
        ColumnSpec::new("publica", "boolean", true, None),
    ])
    .with_unique(&["nome", "municipio", "uf"])
}

pub fn curso(id: i64, nome: &str) -> RawRecord {
    RawRecord::new().with("id", id).with("nome", nome)
}

pub fn escola(nome: &str, municipio: &str) -> RawRecord {
    RawRecord::new()
        .with("nome", nome)
        .with("municipio", municipio)
        .with("uf", "MA")
        .with("rede", "estadual")
        .with("publica", true)
}
