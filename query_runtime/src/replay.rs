//! Replay: rebuild a store from a write log.
//!
//! A pure function of (schemas, batches): every rebuild starts from a
//! fresh store and applies the batches in log order.

use query_kernel::error::EngineError;
use query_kernel::fragment::Fragment;
use query_kernel::hashing::canonical_hash_entities;
use query_kernel::schema::TableSchema;

use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use crate::query::run_query_now;
use crate::store::TableStore;
use crate::write_log::LoggedBatch;

/// Build a hydrated store with `schemas` registered and every batch applied.
pub fn rebuild_store(
    schemas: &[TableSchema],
    batches: &[LoggedBatch],
    config: RuntimeConfig,
) -> Result<TableStore, RuntimeError> {
    let store = TableStore::new(config);
    for schema in schemas {
        store.register_table(schema.clone())?;
    }
    for batch in batches {
        let applied = store.apply(batch.writes.clone())?;
        if applied.sequence != batch.sequence {
            return Err(RuntimeError::Engine(EngineError::SequenceViolation {
                expected: applied.sequence,
                got: batch.sequence,
            }));
        }
    }
    store.mark_hydrated();
    Ok(store)
}

/// Rebuild, then hash the result of the query described by `fragments`.
pub fn rebuild_hash(
    schemas: &[TableSchema],
    batches: &[LoggedBatch],
    fragments: &[Fragment],
) -> Result<String, RuntimeError> {
    let store = rebuild_store(schemas, batches, RuntimeConfig::default())?;
    let matching = run_query_now(&store, fragments)?;
    Ok(canonical_hash_entities(&matching))
}

/// Rebuild twice and require identical query hashes.
pub fn verify_determinism(
    schemas: &[TableSchema],
    batches: &[LoggedBatch],
    fragments: &[Fragment],
) -> Result<String, RuntimeError> {
    let first = rebuild_hash(schemas, batches, fragments)?;
    let second = rebuild_hash(schemas, batches, fragments)?;
    if first != second {
        return Err(RuntimeError::Nondeterministic { first, second });
    }
    Ok(first)
}
