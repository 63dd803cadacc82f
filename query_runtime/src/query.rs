//! Query API: one-shot queries and live subscriptions.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::{error, info};
use tokio::sync::{mpsc, watch};

use query_kernel::change::ChangeBatch;
use query_kernel::diff::{ChangeType, EntityChange, SubjectChange};
use query_kernel::engine::QueryEngine;
use query_kernel::entity::{encode_subject, Entity};
use query_kernel::evaluate::evaluate;
use query_kernel::fragment::Fragment;
use query_kernel::plan::{compile_with, CompiledQuery};

use crate::error::RuntimeError;
use crate::store::{Hydration, Listener, StoreData, TableStore, WeakTableStore};

fn compile_for(store: &TableStore, fragments: &[Fragment]) -> Result<CompiledQuery, RuntimeError> {
    Ok(compile_with(fragments, &store.config().compile)?)
}

fn snapshot_entities(store: &TableStore, plan: &CompiledQuery) -> BTreeSet<Entity> {
    store.with_snapshot(|view| {
        evaluate(view, plan)
            .iter()
            .map(encode_subject)
            .collect()
    })
}

/// Evaluate a query once against a hydrated store without waiting.
pub fn run_query_now(
    store: &TableStore,
    fragments: &[Fragment],
) -> Result<BTreeSet<Entity>, RuntimeError> {
    let plan = compile_for(store, fragments)?;
    match store.hydration() {
        Hydration::Ready => Ok(snapshot_entities(store, &plan)),
        Hydration::Pending => Err(RuntimeError::StoreUnavailable(
            "store is not hydrated".to_string(),
        )),
        Hydration::Failed(reason) => Err(RuntimeError::StoreUnavailable(reason)),
    }
}

/// Evaluate a query once, after the store has hydrated.
pub async fn run_query(
    store: &TableStore,
    fragments: &[Fragment],
) -> Result<BTreeSet<Entity>, RuntimeError> {
    let plan = compile_for(store, fragments)?;
    store.wait_hydrated().await?;
    Ok(snapshot_entities(store, &plan))
}

/// Subscribe to a query. The first item on `updates` is the initial
/// batch of `enter` changes, possibly empty.
pub async fn define_query(
    store: &TableStore,
    fragments: &[Fragment],
) -> Result<LiveQuery, RuntimeError> {
    let plan = compile_for(store, fragments)?;
    store.wait_hydrated().await?;

    let (id, (matching, updates)) = store.attach(|data| {
        let mut engine = QueryEngine::new(data, plan, data.sequence());
        let initial: Vec<EntityChange> = engine
            .initial_changes()
            .iter()
            .map(SubjectChange::encode)
            .collect();

        let (matching_tx, matching_rx) =
            watch::channel(initial.iter().map(|c| c.subject.clone()).collect::<EntitySet>());
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        // receiver is alive, send cannot fail
        let _ = updates_tx.send(initial);

        let listener: Listener = Box::new(move |data: &StoreData, batch: &ChangeBatch| {
            if updates_tx.is_closed() && matching_tx.is_closed() {
                return false;
            }
            match engine.apply_batch(data, batch) {
                Ok(None) => true,
                Ok(Some(changes)) => {
                    let encoded: Vec<EntityChange> =
                        changes.iter().map(SubjectChange::encode).collect();
                    matching_tx.send_if_modified(|members| {
                        for change in &encoded {
                            match change.change_type {
                                ChangeType::Enter => members.insert(change.subject.clone()),
                                ChangeType::Exit => members.remove(&change.subject),
                            };
                        }
                        !encoded.is_empty()
                    });
                    let _ = updates_tx.send(encoded);
                    true
                }
                Err(err) => {
                    error!("live query dropped: {}", err);
                    false
                }
            }
        });
        (listener, (matching_rx, updates_rx))
    });

    info!(
        "live query {} subscribed with {} matching",
        id,
        matching.borrow().len()
    );
    Ok(LiveQuery {
        id,
        matching,
        updates,
        store: store.downgrade(),
    })
}

/// Live matching set in the order subjects entered. Insert and remove
/// are O(log n).
#[derive(Debug, Clone, Default)]
pub struct EntitySet {
    order: BTreeMap<u64, Entity>,
    slots: HashMap<Entity, u64>,
    next_slot: u64,
}

impl EntitySet {
    fn insert(&mut self, entity: Entity) -> bool {
        if self.slots.contains_key(&entity) {
            return false;
        }
        let slot = self.next_slot;
        self.next_slot += 1;
        self.slots.insert(entity.clone(), slot);
        self.order.insert(slot, entity);
        true
    }

    fn remove(&mut self, entity: &Entity) -> bool {
        match self.slots.remove(entity) {
            Some(slot) => {
                self.order.remove(&slot);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, entity: &Entity) -> bool {
        self.slots.contains_key(entity)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.order.values()
    }
}

impl FromIterator<Entity> for EntitySet {
    fn from_iter<I: IntoIterator<Item = Entity>>(iter: I) -> Self {
        let mut set = Self::default();
        for entity in iter {
            set.insert(entity);
        }
        set
    }
}

/// Handle to a live subscription. Dropping it unsubscribes.
///
/// The matching set is published under the store lock, so it is only
/// read through short borrows inside these methods. Never hold a borrow
/// of it across `TableStore::apply`.
pub struct LiveQuery {
    id: u64,
    matching: watch::Receiver<EntitySet>,
    /// One item per processed batch.
    pub updates: mpsc::UnboundedReceiver<Vec<EntityChange>>,
    store: WeakTableStore,
}

impl LiveQuery {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next change batch, or `None` once the subscription has ended.
    pub async fn next_update(&mut self) -> Option<Vec<EntityChange>> {
        self.updates.recv().await
    }

    pub fn try_next_update(&mut self) -> Option<Vec<EntityChange>> {
        self.updates.try_recv().ok()
    }

    /// Snapshot of the matching set, in the order subjects entered.
    pub fn current_matching(&self) -> Vec<Entity> {
        self.matching.borrow().iter().cloned().collect()
    }

    pub fn matching_len(&self) -> usize {
        self.matching.borrow().len()
    }

    pub fn is_matching(&self, entity: &Entity) -> bool {
        self.matching.borrow().contains(entity)
    }

    /// Whether membership changed since the matching set was last seen
    /// through `next_matching`.
    pub fn matching_changed(&self) -> bool {
        self.matching.has_changed().unwrap_or(false)
    }

    /// Wait for the next membership change and return the new set, or
    /// `None` once the subscription has ended.
    pub async fn next_matching(&mut self) -> Option<Vec<Entity>> {
        self.matching.changed().await.ok()?;
        let current = self.matching.borrow_and_update();
        Some(current.iter().cloned().collect())
    }

    pub(crate) fn with_matching<T>(&self, f: impl FnOnce(&EntitySet) -> T) -> T {
        f(&self.matching.borrow())
    }
}

impl Drop for LiveQuery {
    fn drop(&mut self) {
        if let Some(store) = self.store.upgrade() {
            if store.detach(self.id) {
                info!("live query {} unsubscribed", self.id);
            }
        }
    }
}
