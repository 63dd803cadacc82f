//! Query fragments: single predicate clauses over one table.
//!
//! Fragments carry the table's schema so the compiler can derive
//! subjects and check fields without a registry lookup.

use std::sync::Arc;

use crate::schema::TableSchema;
use crate::subject::FieldValues;

#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// Subject has a row in the table.
    Has { table: Arc<TableSchema> },
    /// Subject has no row in the table at all.
    Not { table: Arc<TableSchema> },
    /// Subject has a row whose fields equal `value`.
    HasValue {
        table: Arc<TableSchema>,
        value: FieldValues,
    },
    /// Subject has a row and every field in `value` differs from it.
    /// A subject without a row does not match.
    NotValue {
        table: Arc<TableSchema>,
        value: FieldValues,
    },
}

impl Fragment {
    pub fn table(&self) -> &Arc<TableSchema> {
        match self {
            Fragment::Has { table }
            | Fragment::Not { table }
            | Fragment::HasValue { table, .. }
            | Fragment::NotValue { table, .. } => table,
        }
    }

    /// Whether the fragment requires the table's row to be present.
    pub fn requires_row(&self) -> bool {
        !matches!(self, Fragment::Not { .. })
    }
}

pub fn has(table: &Arc<TableSchema>) -> Fragment {
    Fragment::Has {
        table: Arc::clone(table),
    }
}

pub fn not(table: &Arc<TableSchema>) -> Fragment {
    Fragment::Not {
        table: Arc::clone(table),
    }
}

pub fn has_value(table: &Arc<TableSchema>, value: FieldValues) -> Fragment {
    Fragment::HasValue {
        table: Arc::clone(table),
        value,
    }
}

pub fn not_value(table: &Arc<TableSchema>, value: FieldValues) -> Fragment {
    Fragment::NotValue {
        table: Arc::clone(table),
        value,
    }
}
