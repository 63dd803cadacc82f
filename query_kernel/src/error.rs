//! Kernel error types.

use thiserror::Error;

use crate::schema::TableId;
use crate::value::ValueKind;

/// Query construction failures. Always a caller configuration error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("query has no Has, HasValue or NotValue fragment")]
    EmptyFrom,

    #[error("table {table} has no value field {field:?}")]
    UnknownField { table: TableId, field: String },

    #[error("field {table}.{field} is {expected}, query compares it with {found}")]
    FieldKindMismatch {
        table: TableId,
        field: String,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("table {table} is both required and excluded")]
    ContradictoryPresence { table: TableId },

    #[error("table {table} key signature {found} does not match {expected}")]
    SubjectShapeMismatch {
        table: TableId,
        expected: String,
        found: String,
    },
}

/// Failures while applying change batches to a live engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("change batch sequence violation: expected {expected}, got {got}")]
    SequenceViolation { expected: u64, got: u64 },
}
