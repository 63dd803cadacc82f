//! Runtime error type.

use thiserror::Error;

use query_kernel::entity::Entity;
use query_kernel::error::{CompileError, EngineError};
use query_kernel::schema::TableId;
use query_kernel::value::ValueKind;

use crate::write_log::WriteLogError;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("unknown table {0}")]
    UnknownTable(TableId),

    #[error("table {0} is already registered")]
    DuplicateTable(TableId),

    #[error("key for table {table} has {found} fields, schema has {expected}")]
    KeyArity {
        table: TableId,
        expected: usize,
        found: usize,
    },

    #[error("field {table}.{field} is {expected}, write has {found}")]
    KindMismatch {
        table: TableId,
        field: String,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("write to {table} is missing field {field:?}")]
    MissingField { table: TableId, field: String },

    #[error("table {table} has no value field {field:?}")]
    UnexpectedField { table: TableId, field: String },

    #[error("table {table} has no row for {subject}")]
    RowNotFound { table: TableId, subject: Entity },

    #[error(transparent)]
    WriteLog(#[from] WriteLogError),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("replay is not deterministic: {first} != {second}")]
    Nondeterministic { first: String, second: String },

    #[error("fixture: {0}")]
    Fixture(String),
}
