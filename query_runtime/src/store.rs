//! In-memory table store with a synchronous change feed.
//!
//! Each `apply` call is one store transition:
//!   1. validate every write against the schemas (nothing changes on error)
//!   2. apply all writes, assign the next sequence
//!   3. notify live subscriptions in registration order, under the lock
//!
//! Concurrency: one Mutex serializes writers and notification, so every
//! subscription sees batches in production order and never half-applied.
//! Readers only see the store between transitions.

use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use query_kernel::change::{ChangeBatch, ChangeKind, RowChange};
use query_kernel::entity::encode_subject;
use query_kernel::error::EngineError;
use query_kernel::schema::{TableId, TableSchema};
use query_kernel::subject::{FieldValues, Subject};
use query_kernel::value::Value;
use query_kernel::view::StoreView;

use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use crate::write_log::read_write_log;

/// A single row mutation. `Set` carries the full value record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TableWrite {
    Set {
        table_id: TableId,
        key: Subject,
        values: FieldValues,
    },
    Delete {
        table_id: TableId,
        key: Subject,
    },
}

impl TableWrite {
    pub fn set(table_id: impl Into<TableId>, key: Subject, values: FieldValues) -> Self {
        TableWrite::Set {
            table_id: table_id.into(),
            key,
            values,
        }
    }

    pub fn delete(table_id: impl Into<TableId>, key: Subject) -> Self {
        TableWrite::Delete {
            table_id: table_id.into(),
            key,
        }
    }

    pub fn table_id(&self) -> &TableId {
        match self {
            TableWrite::Set { table_id, .. } | TableWrite::Delete { table_id, .. } => table_id,
        }
    }

    pub fn key(&self) -> &Subject {
        match self {
            TableWrite::Set { key, .. } | TableWrite::Delete { key, .. } => key,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hydration {
    Pending,
    Ready,
    Failed(String),
}

struct Row {
    slot: u64,
    values: FieldValues,
}

/// Rows of one table, iterable in insertion order.
struct TableRows {
    schema: Arc<TableSchema>,
    rows: HashMap<Subject, Row>,
    order: BTreeMap<u64, Subject>,
    next_slot: u64,
}

impl TableRows {
    fn new(schema: Arc<TableSchema>) -> Self {
        Self {
            schema,
            rows: HashMap::new(),
            order: BTreeMap::new(),
            next_slot: 0,
        }
    }

    fn set(&mut self, key: Subject, values: FieldValues) -> ChangeKind {
        if let Some(row) = self.rows.get_mut(&key) {
            row.values = values;
            return ChangeKind::Update;
        }
        let slot = self.next_slot;
        self.next_slot += 1;
        self.order.insert(slot, key.clone());
        self.rows.insert(key, Row { slot, values });
        ChangeKind::Insert
    }

    fn delete(&mut self, key: &Subject) {
        if let Some(row) = self.rows.remove(key) {
            self.order.remove(&row.slot);
        }
    }
}

/// Point-in-time row state. Implements the kernel's read contract.
pub(crate) struct StoreData {
    tables: BTreeMap<TableId, TableRows>,
    sequence: u64,
}

impl StoreData {
    pub(crate) fn sequence(&self) -> u64 {
        self.sequence
    }

    fn table(&self, table_id: &TableId) -> Result<&TableRows, RuntimeError> {
        self.tables
            .get(table_id)
            .ok_or_else(|| RuntimeError::UnknownTable(table_id.clone()))
    }

    /// Check a whole batch before any of it is applied. Deletes see the
    /// effect of earlier writes in the same batch.
    fn validate(&self, writes: &[TableWrite]) -> Result<(), RuntimeError> {
        let mut present: HashMap<(&TableId, &Subject), bool> = HashMap::new();
        for write in writes {
            let table = self.table(write.table_id())?;
            validate_key(&table.schema, write.key())?;
            match write {
                TableWrite::Set {
                    table_id,
                    key,
                    values,
                } => {
                    validate_values(&table.schema, values)?;
                    present.insert((table_id, key), true);
                }
                TableWrite::Delete { table_id, key } => {
                    let exists = present
                        .get(&(table_id, key))
                        .copied()
                        .unwrap_or_else(|| table.rows.contains_key(key));
                    if !exists {
                        return Err(RuntimeError::RowNotFound {
                            table: table_id.clone(),
                            subject: encode_subject(key),
                        });
                    }
                    present.insert((table_id, key), false);
                }
            }
        }
        Ok(())
    }

    /// Apply validated writes as one transition.
    fn commit(&mut self, writes: Vec<TableWrite>) -> ChangeBatch {
        let mut changes = Vec::with_capacity(writes.len());
        for write in writes {
            match write {
                TableWrite::Set {
                    table_id,
                    key,
                    values,
                } => {
                    let Some(table) = self.tables.get_mut(&table_id) else {
                        continue;
                    };
                    let kind = table.set(key.clone(), values);
                    changes.push(RowChange {
                        table_id,
                        subject: key,
                        kind,
                    });
                }
                TableWrite::Delete { table_id, key } => {
                    let Some(table) = self.tables.get_mut(&table_id) else {
                        continue;
                    };
                    table.delete(&key);
                    changes.push(RowChange {
                        table_id,
                        subject: key,
                        kind: ChangeKind::Delete,
                    });
                }
            }
        }
        self.sequence += 1;
        ChangeBatch {
            sequence: self.sequence,
            changes,
        }
    }
}

impl StoreView for StoreData {
    fn rows<'a>(&'a self, table: &TableId) -> Box<dyn Iterator<Item = &'a Subject> + 'a> {
        match self.tables.get(table) {
            Some(t) => Box::new(t.order.values()),
            None => Box::new(std::iter::empty()),
        }
    }

    fn row_count(&self, table: &TableId) -> usize {
        self.tables.get(table).map_or(0, |t| t.rows.len())
    }

    fn has_row(&self, table: &TableId, subject: &Subject) -> bool {
        self.tables
            .get(table)
            .is_some_and(|t| t.rows.contains_key(subject))
    }

    fn value(&self, table: &TableId, subject: &Subject, field: &str) -> Option<&Value> {
        self.tables.get(table)?.rows.get(subject)?.values.get(field)
    }
}

fn validate_key(schema: &TableSchema, key: &Subject) -> Result<(), RuntimeError> {
    if key.len() != schema.key_schema.len() {
        return Err(RuntimeError::KeyArity {
            table: schema.table_id.clone(),
            expected: schema.key_schema.len(),
            found: key.len(),
        });
    }
    for (def, value) in schema.key_schema.iter().zip(key.values()) {
        if def.kind != value.kind() {
            return Err(RuntimeError::KindMismatch {
                table: schema.table_id.clone(),
                field: def.name.clone(),
                expected: def.kind,
                found: value.kind(),
            });
        }
    }
    Ok(())
}

fn validate_values(schema: &TableSchema, values: &FieldValues) -> Result<(), RuntimeError> {
    for def in &schema.value_schema {
        let value = values.get(&def.name).ok_or_else(|| RuntimeError::MissingField {
            table: schema.table_id.clone(),
            field: def.name.clone(),
        })?;
        if def.kind != value.kind() {
            return Err(RuntimeError::KindMismatch {
                table: schema.table_id.clone(),
                field: def.name.clone(),
                expected: def.kind,
                found: value.kind(),
            });
        }
    }
    if let Some(extra) = values.keys().find(|k| schema.value_field(k).is_none()) {
        return Err(RuntimeError::UnexpectedField {
            table: schema.table_id.clone(),
            field: extra.clone(),
        });
    }
    Ok(())
}

/// Change feed callback. Returns `false` to be removed from the feed.
pub(crate) type Listener = Box<dyn FnMut(&StoreData, &ChangeBatch) -> bool + Send>;

struct StoreState {
    data: StoreData,
    listeners: Vec<(u64, Listener)>,
    next_listener: u64,
}

impl StoreState {
    fn notify(&mut self, batch: &ChangeBatch) {
        let data = &self.data;
        self.listeners.retain_mut(|(id, listener)| {
            let keep = listener(data, batch);
            if !keep {
                warn!("live query {} removed from change feed", id);
            }
            keep
        });
    }
}

pub(crate) struct Shared {
    state: Mutex<StoreState>,
    hydration: watch::Sender<Hydration>,
    config: RuntimeConfig,
}

/// Cheap, cloneable handle to a shared store.
#[derive(Clone)]
pub struct TableStore {
    shared: Arc<Shared>,
}

/// Non-owning store handle held by live queries.
#[derive(Clone)]
pub(crate) struct WeakTableStore(Weak<Shared>);

impl WeakTableStore {
    pub(crate) fn upgrade(&self) -> Option<TableStore> {
        self.0.upgrade().map(|shared| TableStore { shared })
    }
}

impl TableStore {
    /// Create an empty store awaiting hydration.
    pub fn new(config: RuntimeConfig) -> Self {
        let (hydration, _) = watch::channel(Hydration::Pending);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(StoreState {
                    data: StoreData {
                        tables: BTreeMap::new(),
                        sequence: 0,
                    },
                    listeners: Vec::new(),
                    next_listener: 0,
                }),
                hydration,
                config,
            }),
        }
    }

    /// Create an empty store that is already hydrated.
    pub fn hydrated(config: RuntimeConfig) -> Self {
        let store = Self::new(config);
        store.mark_hydrated();
        store
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.shared.config
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        // rows are fully committed before any listener runs
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn downgrade(&self) -> WeakTableStore {
        WeakTableStore(Arc::downgrade(&self.shared))
    }

    pub fn register_table(&self, schema: TableSchema) -> Result<Arc<TableSchema>, RuntimeError> {
        let mut state = self.lock();
        if state.data.tables.contains_key(&schema.table_id) {
            return Err(RuntimeError::DuplicateTable(schema.table_id));
        }
        let schema = Arc::new(schema);
        state
            .data
            .tables
            .insert(schema.table_id.clone(), TableRows::new(Arc::clone(&schema)));
        Ok(schema)
    }

    pub fn schema(&self, table_id: &TableId) -> Option<Arc<TableSchema>> {
        self.lock()
            .data
            .tables
            .get(table_id)
            .map(|t| Arc::clone(&t.schema))
    }

    /// Sequence of the last applied batch; 0 for a fresh store.
    pub fn sequence(&self) -> u64 {
        self.lock().data.sequence
    }

    /// Apply `writes` as one atomic transition and notify subscriptions.
    pub fn apply(&self, writes: Vec<TableWrite>) -> Result<ChangeBatch, RuntimeError> {
        let mut state = self.lock();
        state.data.validate(&writes)?;
        let batch = state.data.commit(writes);
        state.notify(&batch);
        Ok(batch)
    }

    /// Run `f` against a consistent point-in-time view.
    pub fn with_snapshot<T>(&self, f: impl FnOnce(&dyn StoreView) -> T) -> T {
        let state = self.lock();
        f(&state.data)
    }

    /// Register a change-feed listener built from the current state.
    /// No batch can slip between the snapshot and the registration.
    pub(crate) fn attach<T>(&self, build: impl FnOnce(&StoreData) -> (Listener, T)) -> (u64, T) {
        let mut state = self.lock();
        let (listener, out) = build(&state.data);
        let id = state.next_listener;
        state.next_listener += 1;
        state.listeners.push((id, listener));
        (id, out)
    }

    pub(crate) fn detach(&self, id: u64) -> bool {
        let mut state = self.lock();
        let before = state.listeners.len();
        state.listeners.retain(|(lid, _)| *lid != id);
        state.listeners.len() != before
    }

    pub fn subscription_count(&self) -> usize {
        self.lock().listeners.len()
    }

    // -- Hydration --

    pub fn hydration(&self) -> Hydration {
        self.shared.hydration.borrow().clone()
    }

    pub fn mark_hydrated(&self) {
        self.shared.hydration.send_replace(Hydration::Ready);
        info!("store hydrated at sequence {}", self.sequence());
    }

    pub fn fail_hydration(&self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!("store hydration failed: {}", reason);
        self.shared.hydration.send_replace(Hydration::Failed(reason));
    }

    /// Resolve once the store is hydrated. A failed hydration surfaces
    /// as `StoreUnavailable`; there is no retry here.
    pub async fn wait_hydrated(&self) -> Result<(), RuntimeError> {
        let mut rx = self.shared.hydration.subscribe();
        let state = match rx.wait_for(|h| *h != Hydration::Pending).await {
            Ok(current) => Hydration::clone(&current),
            Err(_) => {
                return Err(RuntimeError::StoreUnavailable(
                    "hydration channel closed".to_string(),
                ))
            }
        };
        match state {
            Hydration::Failed(reason) => Err(RuntimeError::StoreUnavailable(reason)),
            Hydration::Pending | Hydration::Ready => Ok(()),
        }
    }

    /// Replay a write log into the store, then mark it hydrated.
    /// Logged sequences must continue the store's own sequence: a log
    /// starting at 1 only hydrates a store with no applied batches.
    /// Any failure marks hydration failed.
    pub fn hydrate_from_log<R: Read>(&self, reader: R) -> Result<u64, RuntimeError> {
        let result = read_write_log(reader)
            .map_err(RuntimeError::from)
            .and_then(|batches| {
                let count = batches.len() as u64;
                for batch in batches {
                    let expected = self.sequence() + 1;
                    if batch.sequence != expected {
                        return Err(RuntimeError::Engine(EngineError::SequenceViolation {
                            expected,
                            got: batch.sequence,
                        }));
                    }
                    self.apply(batch.writes)?;
                }
                Ok(count)
            });
        match &result {
            Ok(_) => self.mark_hydrated(),
            Err(err) => self.fail_hydration(err.to_string()),
        }
        result
    }
}
