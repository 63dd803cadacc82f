//! Incremental matching engine.
//!
//! Stateful holder of one query's matching set. Seeds itself from the
//! snapshot evaluator, then re-checks only the subjects a change batch
//! touches. Strict sequence enforcement, one batch at a time.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use log::{debug, error};

use crate::change::ChangeBatch;
use crate::diff::SubjectChange;
use crate::error::EngineError;
use crate::evaluate::{evaluate, matches};
use crate::plan::CompiledQuery;
use crate::schema::TableId;
use crate::subject::Subject;
use crate::view::StoreView;

/// Subjects in discovery order with O(log n) insert and remove.
#[derive(Debug, Clone, Default)]
pub struct MatchingSet {
    order: BTreeMap<u64, Subject>,
    slots: HashMap<Subject, u64>,
    next_slot: u64,
}

impl MatchingSet {
    fn insert(&mut self, subject: Subject) -> bool {
        if self.slots.contains_key(&subject) {
            return false;
        }
        let slot = self.next_slot;
        self.next_slot += 1;
        self.slots.insert(subject.clone(), slot);
        self.order.insert(slot, subject);
        true
    }

    fn remove(&mut self, subject: &Subject) -> bool {
        match self.slots.remove(subject) {
            Some(slot) => {
                self.order.remove(&slot);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, subject: &Subject) -> bool {
        self.slots.contains_key(subject)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Subject> {
        self.order.values()
    }
}

/// Disagreement between an engine's matching set and a fresh evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipDrift {
    /// Matched by the evaluator, missing from the engine.
    pub missing: Vec<Subject>,
    /// Held by the engine, rejected by the evaluator.
    pub stale: Vec<Subject>,
}

impl MembershipDrift {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.stale.is_empty()
    }
}

pub struct QueryEngine {
    plan: CompiledQuery,
    referenced: BTreeSet<TableId>,
    membership: MatchingSet,
    last_sequence: u64,
}

impl QueryEngine {
    /// Seed an engine from `view`, which reflects store sequence `sequence`.
    pub fn new(view: &dyn StoreView, plan: CompiledQuery, sequence: u64) -> Self {
        let mut membership = MatchingSet::default();
        for subject in evaluate(view, &plan) {
            membership.insert(subject);
        }
        let referenced = plan.referenced_tables();
        Self {
            plan,
            referenced,
            membership,
            last_sequence: sequence,
        }
    }

    pub fn plan(&self) -> &CompiledQuery {
        &self.plan
    }

    pub fn matching(&self) -> &MatchingSet {
        &self.membership
    }

    pub fn contains(&self, subject: &Subject) -> bool {
        self.membership.contains(subject)
    }

    pub fn len(&self) -> usize {
        self.membership.len()
    }

    pub fn is_empty(&self) -> bool {
        self.membership.is_empty()
    }

    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    /// One `Enter` per current member, in matching order.
    pub fn initial_changes(&self) -> Vec<SubjectChange> {
        self.membership
            .iter()
            .cloned()
            .map(SubjectChange::enter)
            .collect()
    }

    /// Apply one change batch. `view` must reflect the store after it.
    ///
    ///   1. Validate sequence (strictly increasing, no gaps)
    ///   2. Collect affected subjects from events on referenced tables
    ///   3. Skip the batch if none were touched
    ///   4. Re-check each affected subject and emit its transition
    ///
    /// Returns `None` for a skipped batch, otherwise the whole diff for
    /// the batch (possibly empty).
    pub fn apply_batch(
        &mut self,
        view: &dyn StoreView,
        batch: &ChangeBatch,
    ) -> Result<Option<Vec<SubjectChange>>, EngineError> {
        let expected = self.last_sequence + 1;
        if batch.sequence != expected {
            error!(
                "change batch out of order: expected {}, got {}",
                expected, batch.sequence
            );
            return Err(EngineError::SequenceViolation {
                expected,
                got: batch.sequence,
            });
        }
        self.last_sequence = batch.sequence;

        let affected = self.affected_subjects(batch);
        if affected.is_empty() {
            return Ok(None);
        }

        let mut changes = Vec::new();
        for subject in affected {
            let now = matches(view, &self.plan, subject);
            let was = self.membership.contains(subject);
            if now && !was {
                self.membership.insert(subject.clone());
                changes.push(SubjectChange::enter(subject.clone()));
            } else if was && !now {
                self.membership.remove(subject);
                changes.push(SubjectChange::exit(subject.clone()));
            }
        }

        debug!(
            "batch {} applied: {} events, {} changes, {} matching",
            batch.sequence,
            batch.changes.len(),
            changes.len(),
            self.membership.len()
        );
        Ok(Some(changes))
    }

    /// Apply an ordered run of batches, returning the non-skipped diffs.
    pub fn apply_sequence<'b>(
        &mut self,
        view: &dyn StoreView,
        batches: impl IntoIterator<Item = &'b ChangeBatch>,
    ) -> Result<Vec<Vec<SubjectChange>>, EngineError> {
        let mut out = Vec::new();
        for batch in batches {
            if let Some(changes) = self.apply_batch(view, batch)? {
                out.push(changes);
            }
        }
        Ok(out)
    }

    /// Compare the matching set against a fresh evaluation of `view`.
    pub fn check_consistency(&self, view: &dyn StoreView) -> MembershipDrift {
        let fresh = evaluate(view, &self.plan);
        let fresh_set: HashSet<&Subject> = fresh.iter().collect();
        let missing = fresh
            .iter()
            .filter(|s| !self.membership.contains(s))
            .cloned()
            .collect();
        let stale = self
            .membership
            .iter()
            .filter(|s| !fresh_set.contains(s))
            .cloned()
            .collect();
        MembershipDrift { missing, stale }
    }

    /// Subjects touched on referenced tables, first-touch order, no repeats.
    fn affected_subjects<'b>(&self, batch: &'b ChangeBatch) -> Vec<&'b Subject> {
        let mut seen: HashSet<&Subject> = HashSet::new();
        batch
            .changes
            .iter()
            .filter(|c| self.referenced.contains(&c.table_id))
            .map(|c| &c.subject)
            .filter(|s| seen.insert(*s))
            .collect()
    }
}
