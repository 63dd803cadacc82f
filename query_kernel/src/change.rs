//! Row-change events delivered by a store's change feed.
//!
//! Events are pure data: which table, which subject, what happened.
//! They carry no values; the engine reads current values from the view.

use serde::{Deserialize, Serialize};

use crate::schema::TableId;
use crate::subject::Subject;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowChange {
    pub table_id: TableId,
    pub subject: Subject,
    pub kind: ChangeKind,
}

/// All rows touched by one store transition.
///
/// Sequences are strictly increasing with no gaps; an empty store is at
/// sequence 0 and its first batch is 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeBatch {
    pub sequence: u64,
    pub changes: Vec<RowChange>,
}
