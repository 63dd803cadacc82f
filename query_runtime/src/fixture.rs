//! JSON replay fixtures.
//!
//! A fixture declares tables, queries and write batches. Running it
//! subscribes every query, applies the batches one by one and checks
//! each query's matching set (as a set) after every batch. The batches
//! also pass through the binary write log, and a rebuild from the
//! decoded log must hash to the same result as the live query.

use std::collections::BTreeSet;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use query_kernel::entity::Entity;
use query_kernel::fragment::{self, Fragment};
use query_kernel::hashing::canonical_hash_entities;
use query_kernel::schema::{TableId, TableSchema};
use query_kernel::subject::FieldValues;

use crate::config::RuntimeConfig;
use crate::drift::compare_matching;
use crate::error::RuntimeError;
use crate::query::{define_query, run_query_now, LiveQuery};
use crate::replay::verify_determinism;
use crate::store::{TableStore, TableWrite};
use crate::write_log::{read_write_log, WriteLogWriter};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentDef {
    Has(TableId),
    Not(TableId),
    HasValue { table: TableId, value: FieldValues },
    NotValue { table: TableId, value: FieldValues },
}

impl FragmentDef {
    /// Bind to the schema registered on `store`.
    pub fn resolve(&self, store: &TableStore) -> Result<Fragment, RuntimeError> {
        let table_id = match self {
            FragmentDef::Has(t) | FragmentDef::Not(t) => t,
            FragmentDef::HasValue { table, .. } | FragmentDef::NotValue { table, .. } => table,
        };
        let schema = store
            .schema(table_id)
            .ok_or_else(|| RuntimeError::UnknownTable(table_id.clone()))?;
        Ok(match self {
            FragmentDef::Has(_) => fragment::has(&schema),
            FragmentDef::Not(_) => fragment::not(&schema),
            FragmentDef::HasValue { value, .. } => fragment::has_value(&schema, value.clone()),
            FragmentDef::NotValue { value, .. } => fragment::not_value(&schema, value.clone()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryDef {
    pub name: String,
    pub fragments: Vec<FragmentDef>,
    /// Matching set after each batch.
    pub expected: Vec<BTreeSet<Entity>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Fixture {
    pub tables: Vec<TableSchema>,
    pub queries: Vec<QueryDef>,
    pub batches: Vec<Vec<TableWrite>>,
    #[serde(default)]
    pub config: RuntimeConfig,
}

impl Fixture {
    pub fn from_json_str(json: &str) -> Result<Self, RuntimeError> {
        serde_json::from_str(json).map_err(|e| RuntimeError::Fixture(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, RuntimeError> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| RuntimeError::Fixture(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&data)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub name: String,
    pub hash: String,
    pub final_matching: Vec<Entity>,
    pub failures: Vec<String>,
}

impl QueryOutcome {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

fn describe(entities: &[Entity]) -> String {
    let names: Vec<&str> = entities.iter().map(Entity::as_str).collect();
    format!("[{}]", names.join(", "))
}

/// Replay a fixture. Fixture-level problems (bad tables, rejected
/// batches, wrong expectation counts) are errors; mismatches are
/// reported per query.
pub async fn run(fixture: &Fixture) -> Result<Vec<QueryOutcome>, RuntimeError> {
    for query in &fixture.queries {
        if query.expected.len() != fixture.batches.len() {
            return Err(RuntimeError::Fixture(format!(
                "query {} has {} expectations for {} batches",
                query.name,
                query.expected.len(),
                fixture.batches.len()
            )));
        }
    }

    let store = TableStore::new(fixture.config.clone());
    for table in &fixture.tables {
        store.register_table(table.clone())?;
    }
    store.mark_hydrated();

    let mut live: Vec<(LiveQuery, Vec<Fragment>)> = Vec::with_capacity(fixture.queries.len());
    for query in &fixture.queries {
        let fragments = query
            .fragments
            .iter()
            .map(|f| f.resolve(&store))
            .collect::<Result<Vec<_>, _>>()?;
        live.push((define_query(&store, &fragments).await?, fragments));
    }

    let mut outcomes: Vec<QueryOutcome> = fixture
        .queries
        .iter()
        .map(|q| QueryOutcome {
            name: q.name.clone(),
            hash: String::new(),
            final_matching: Vec::new(),
            failures: Vec::new(),
        })
        .collect();

    let mut log = WriteLogWriter::new(Vec::new());
    for (index, writes) in fixture.batches.iter().enumerate() {
        let batch = store.apply(writes.clone())?;
        log.append(batch.sequence, writes)?;
        debug!("fixture batch {} -> sequence {}", index, batch.sequence);

        for (i, (query, fragments)) in live.iter_mut().enumerate() {
            while query.try_next_update().is_some() {}
            let current = query.current_matching();
            let expected = &fixture.queries[i].expected[index];
            let report = compare_matching(current.iter(), expected.iter());
            if !report.is_clean() {
                outcomes[i].failures.push(format!(
                    "after batch {}: matching {}, missing {}, unexpected {}",
                    index,
                    describe(&current),
                    describe(&report.added),
                    describe(&report.removed)
                ));
            }
            let fresh = run_query_now(&store, fragments.as_slice())?;
            if !compare_matching(current.iter(), fresh.iter()).is_clean() {
                outcomes[i].failures.push(format!(
                    "after batch {}: live matching drifted from snapshot",
                    index
                ));
            }
        }
    }

    let logged = read_write_log(log.into_inner().as_slice())?;
    for (i, (query, fragments)) in live.iter().enumerate() {
        let final_matching = query.current_matching();
        let hash = canonical_hash_entities(&final_matching);
        let replayed = verify_determinism(&fixture.tables, &logged, fragments)?;
        if replayed != hash {
            outcomes[i]
                .failures
                .push(format!("replayed hash {} != live hash {}", replayed, hash));
        }
        outcomes[i].hash = hash;
        outcomes[i].final_matching = final_matching;
    }

    Ok(outcomes)
}
