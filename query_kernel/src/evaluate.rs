//! Snapshot evaluator.
//!
//! Pure function of (view, plan). This is the definition of correctness
//! the incremental engine is held to.

use crate::plan::CompiledQuery;
use crate::subject::Subject;
use crate::view::StoreView;

/// Exact matching set of `plan` against `view`.
///
/// Candidates are drawn from the smallest `from` table and returned in
/// that table's row order.
pub fn evaluate(view: &dyn StoreView, plan: &CompiledQuery) -> Vec<Subject> {
    // compile() guarantees a non-empty `from`
    let Some(driving) = plan
        .from_tables()
        .iter()
        .min_by_key(|t| view.row_count(&t.table_id))
    else {
        return Vec::new();
    };

    view.rows(&driving.table_id)
        .filter(|subject| matches(view, plan, subject))
        .cloned()
        .collect()
}

/// Membership predicate for a single subject.
pub fn matches(view: &dyn StoreView, plan: &CompiledQuery, subject: &Subject) -> bool {
    if plan.from_tables().is_empty() {
        return false;
    }
    if !plan
        .from_tables()
        .iter()
        .all(|t| view.has_row(&t.table_id, subject))
    {
        return false;
    }
    if plan
        .except_tables()
        .iter()
        .any(|t| view.has_row(&t.table_id, subject))
    {
        return false;
    }
    plan.conditions()
        .iter()
        .all(|c| c.holds(view.value(&c.table_id, subject, &c.field)))
}
