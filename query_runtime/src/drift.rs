//! Drift detection between matching sets.

use std::collections::BTreeSet;

use query_kernel::entity::{encode_subject, Entity};
use query_kernel::evaluate::evaluate;
use query_kernel::fragment::Fragment;
use query_kernel::plan::compile_with;

use crate::error::RuntimeError;
use crate::query::LiveQuery;
use crate::store::TableStore;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriftReport {
    /// In `b` but not in `a`.
    pub added: Vec<Entity>,
    /// In `a` but not in `b`.
    pub removed: Vec<Entity>,
}

impl DriftReport {
    pub fn is_clean(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

pub fn compare_matching<'a, 'b>(
    a: impl IntoIterator<Item = &'a Entity>,
    b: impl IntoIterator<Item = &'b Entity>,
) -> DriftReport {
    let set_a: BTreeSet<&Entity> = a.into_iter().collect();
    let set_b: BTreeSet<&Entity> = b.into_iter().collect();
    DriftReport {
        added: set_b.difference(&set_a).map(|e| (*e).clone()).collect(),
        removed: set_a.difference(&set_b).map(|e| (*e).clone()).collect(),
    }
}

/// Compare a live query's matching set against a fresh evaluation.
///
/// Both sides are read under the store lock, so no batch can land in
/// between.
pub async fn check_live_query(
    store: &TableStore,
    live: &LiveQuery,
    fragments: &[Fragment],
) -> Result<DriftReport, RuntimeError> {
    let plan = compile_with(fragments, &store.config().compile)?;
    store.wait_hydrated().await?;
    Ok(store.with_snapshot(|view| {
        let fresh: Vec<Entity> = evaluate(view, &plan).iter().map(encode_subject).collect();
        live.with_matching(|members| compare_matching(members.iter(), fresh.iter()))
    }))
}
