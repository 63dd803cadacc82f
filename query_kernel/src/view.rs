//! Read-only, point-in-time access to a table store.
//!
//! The engine never mutates a store; it only reads through this trait,
//! and only while the store guarantees the view is consistent.

use crate::schema::TableId;
use crate::subject::Subject;
use crate::value::Value;

pub trait StoreView {
    /// Subjects with a row in `table`, in the store's row order.
    /// An unknown table has no rows.
    fn rows<'a>(&'a self, table: &TableId) -> Box<dyn Iterator<Item = &'a Subject> + 'a>;

    fn row_count(&self, table: &TableId) -> usize;

    fn has_row(&self, table: &TableId, subject: &Subject) -> bool;

    /// Current value of `field` in `table` for `subject`, if the row exists.
    fn value(&self, table: &TableId, subject: &Subject, field: &str) -> Option<&Value>;
}
