//! Table schema metadata.
//!
//! The kernel never stores rows. It only reads schemas to derive table
//! subjects and to check query conditions at compile time.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::ValueKind;

/// Stable identifier of a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableId(String);

impl TableId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TableId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A named, typed field of a key or value schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDef {
    pub name: String,
    pub kind: ValueKind,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Key and value layout of one table. Field order is significant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableSchema {
    pub table_id: TableId,
    pub key_schema: Vec<FieldDef>,
    pub value_schema: Vec<FieldDef>,
}

impl TableSchema {
    pub fn new(
        table_id: impl Into<TableId>,
        key_schema: Vec<FieldDef>,
        value_schema: Vec<FieldDef>,
    ) -> Self {
        Self {
            table_id: table_id.into(),
            key_schema,
            value_schema,
        }
    }

    /// Names of the key fields, in key order.
    pub fn key_names(&self) -> Vec<String> {
        self.key_schema.iter().map(|f| f.name.clone()).collect()
    }

    /// Look up a value field by name.
    pub fn value_field(&self, name: &str) -> Option<&FieldDef> {
        self.value_schema.iter().find(|f| f.name == name)
    }

    /// Ordered `(name, kind)` pairs of the key schema.
    pub fn key_signature(&self) -> Vec<(&str, ValueKind)> {
        self.key_schema
            .iter()
            .map(|f| (f.name.as_str(), f.kind))
            .collect()
    }
}

impl From<String> for TableId {
    fn from(id: String) -> Self {
        Self(id)
    }
}
