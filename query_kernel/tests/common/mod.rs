//! In-memory store view shared by the kernel tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use query_kernel::change::{ChangeBatch, ChangeKind, RowChange};
use query_kernel::schema::{FieldDef, TableId, TableSchema};
use query_kernel::subject::{FieldValues, Subject};
use query_kernel::value::{Value, ValueKind};
use query_kernel::view::StoreView;

/// Rows kept in insertion order; updates keep their position.
#[derive(Default)]
pub struct MemView {
    tables: BTreeMap<TableId, Vec<(Subject, FieldValues)>>,
    pub sequence: u64,
}

#[derive(Debug)]
pub enum Write {
    Set(TableId, Subject, FieldValues),
    Delete(TableId, Subject),
}

impl MemView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply writes and return the change batch they produce.
    pub fn apply(&mut self, writes: Vec<Write>) -> ChangeBatch {
        let mut changes = Vec::new();
        for w in writes {
            match w {
                Write::Set(table, subject, values) => {
                    let rows = self.tables.entry(table.clone()).or_default();
                    let kind = match rows.iter_mut().find(|(s, _)| *s == subject) {
                        Some(row) => {
                            row.1 = values;
                            ChangeKind::Update
                        }
                        None => {
                            rows.push((subject.clone(), values));
                            ChangeKind::Insert
                        }
                    };
                    changes.push(RowChange {
                        table_id: table,
                        subject,
                        kind,
                    });
                }
                Write::Delete(table, subject) => {
                    let rows = self.tables.entry(table.clone()).or_default();
                    let before = rows.len();
                    rows.retain(|(s, _)| *s != subject);
                    if rows.len() != before {
                        changes.push(RowChange {
                            table_id: table,
                            subject,
                            kind: ChangeKind::Delete,
                        });
                    }
                }
            }
        }
        self.sequence += 1;
        ChangeBatch {
            sequence: self.sequence,
            changes,
        }
    }

    pub fn set(&mut self, table: &TableId, subject: Subject, values: FieldValues) -> ChangeBatch {
        self.apply(vec![Write::Set(table.clone(), subject, values)])
    }

    pub fn delete(&mut self, table: &TableId, subject: Subject) -> ChangeBatch {
        self.apply(vec![Write::Delete(table.clone(), subject)])
    }
}

impl StoreView for MemView {
    fn rows<'a>(&'a self, table: &TableId) -> Box<dyn Iterator<Item = &'a Subject> + 'a> {
        match self.tables.get(table) {
            Some(rows) => Box::new(rows.iter().map(|(s, _)| s)),
            None => Box::new(std::iter::empty()),
        }
    }

    fn row_count(&self, table: &TableId) -> usize {
        self.tables.get(table).map_or(0, Vec::len)
    }

    fn has_row(&self, table: &TableId, subject: &Subject) -> bool {
        self.tables
            .get(table)
            .is_some_and(|rows| rows.iter().any(|(s, _)| s == subject))
    }

    fn value(&self, table: &TableId, subject: &Subject, field: &str) -> Option<&Value> {
        self.tables
            .get(table)?
            .iter()
            .find(|(s, _)| s == subject)
            .and_then(|(_, values)| values.get(field))
    }
}

pub fn player(name: &str) -> Subject {
    Subject::new(vec![Value::Text(name.to_string())])
}

pub fn position(x: i64, y: i64) -> FieldValues {
    FieldValues::from([("x".to_string(), Value::Int(x)), ("y".to_string(), Value::Int(y))])
}

pub fn health(h: u64) -> FieldValues {
    FieldValues::from([("health".to_string(), Value::Uint(h))])
}

pub fn position_table() -> Arc<TableSchema> {
    Arc::new(TableSchema::new(
        "Position",
        vec![FieldDef::new("player", ValueKind::Text)],
        vec![
            FieldDef::new("x", ValueKind::Int),
            FieldDef::new("y", ValueKind::Int),
        ],
    ))
}

pub fn health_table() -> Arc<TableSchema> {
    Arc::new(TableSchema::new(
        "Health",
        vec![FieldDef::new("player", ValueKind::Text)],
        vec![FieldDef::new("health", ValueKind::Uint)],
    ))
}

pub fn terrain_table() -> Arc<TableSchema> {
    Arc::new(TableSchema::new(
        "Terrain",
        vec![
            FieldDef::new("x", ValueKind::Int),
            FieldDef::new("y", ValueKind::Int),
        ],
        vec![FieldDef::new("terrain_type", ValueKind::Uint)],
    ))
}
