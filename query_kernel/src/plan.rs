//! Query compiler: fragments → normalized plan.
//!
//! `from`   tables whose row must exist for the subject,
//! `except` tables whose row disqualifies the subject,
//! `where`  scalar comparisons against rows of `from` tables.
//!
//! A compiled plan is immutable and always has a non-empty `from`.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::CompileError;
use crate::fragment::Fragment;
use crate::schema::{TableId, TableSchema};
use crate::subject::FieldValues;
use crate::value::{Value, ValueKind};

/// Compiler settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CompileOptions {
    /// Reject queries whose referenced tables do not share an identical
    /// ordered key `(name, kind)` signature.
    pub strict_subject_shapes: bool,
}

/// A referenced table and the key fields its subjects are built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSubject {
    pub table_id: TableId,
    pub subject_fields: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConditionOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
}

/// A single comparison of a table field against a constant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryCondition {
    pub table_id: TableId,
    pub field: String,
    pub op: ConditionOp,
    pub right: Value,
}

impl QueryCondition {
    /// Whether `current` satisfies the condition. A missing value never does.
    pub fn holds(&self, current: Option<&Value>) -> bool {
        match (self.op, current) {
            (_, None) => false,
            (ConditionOp::Eq, Some(v)) => *v == self.right,
            (ConditionOp::Ne, Some(v)) => *v != self.right,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledQuery {
    from: Vec<TableSubject>,
    except: Vec<TableSubject>,
    #[serde(rename = "where")]
    conditions: Vec<QueryCondition>,
}

impl CompiledQuery {
    pub fn from_tables(&self) -> &[TableSubject] {
        &self.from
    }

    pub fn except_tables(&self) -> &[TableSubject] {
        &self.except
    }

    pub fn conditions(&self) -> &[QueryCondition] {
        &self.conditions
    }

    /// Every table whose changes can affect membership.
    pub fn referenced_tables(&self) -> BTreeSet<TableId> {
        self.from
            .iter()
            .chain(&self.except)
            .map(|t| t.table_id.clone())
            .chain(self.conditions.iter().map(|c| c.table_id.clone()))
            .collect()
    }
}

/// Compile with default options.
pub fn compile(fragments: &[Fragment]) -> Result<CompiledQuery, CompileError> {
    compile_with(fragments, &CompileOptions::default())
}

pub fn compile_with(
    fragments: &[Fragment],
    options: &CompileOptions,
) -> Result<CompiledQuery, CompileError> {
    let mut from: Vec<TableSubject> = Vec::new();
    let mut except: Vec<TableSubject> = Vec::new();
    let mut conditions: Vec<QueryCondition> = Vec::new();

    for fragment in fragments {
        let table = fragment.table();
        let target = if fragment.requires_row() {
            &mut from
        } else {
            &mut except
        };
        if !target.iter().any(|t| t.table_id == table.table_id) {
            target.push(table_subject(table));
        }

        match fragment {
            Fragment::HasValue { value, .. } => {
                push_conditions(&mut conditions, table, value, ConditionOp::Eq)?;
            }
            Fragment::NotValue { value, .. } => {
                push_conditions(&mut conditions, table, value, ConditionOp::Ne)?;
            }
            Fragment::Has { .. } | Fragment::Not { .. } => {}
        }
    }

    if from.is_empty() {
        return Err(CompileError::EmptyFrom);
    }

    if let Some(both) = except
        .iter()
        .find(|e| from.iter().any(|f| f.table_id == e.table_id))
    {
        return Err(CompileError::ContradictoryPresence {
            table: both.table_id.clone(),
        });
    }

    if options.strict_subject_shapes {
        check_subject_shapes(fragments)?;
    }

    Ok(CompiledQuery {
        from,
        except,
        conditions,
    })
}

fn table_subject(table: &TableSchema) -> TableSubject {
    TableSubject {
        table_id: table.table_id.clone(),
        subject_fields: table.key_names(),
    }
}

fn push_conditions(
    out: &mut Vec<QueryCondition>,
    table: &TableSchema,
    value: &FieldValues,
    op: ConditionOp,
) -> Result<(), CompileError> {
    for (field, right) in value {
        let def = table
            .value_field(field)
            .ok_or_else(|| CompileError::UnknownField {
                table: table.table_id.clone(),
                field: field.clone(),
            })?;
        if def.kind != right.kind() {
            return Err(CompileError::FieldKindMismatch {
                table: table.table_id.clone(),
                field: field.clone(),
                expected: def.kind,
                found: right.kind(),
            });
        }
        out.push(QueryCondition {
            table_id: table.table_id.clone(),
            field: field.clone(),
            op,
            right: right.clone(),
        });
    }
    Ok(())
}

fn check_subject_shapes(fragments: &[Fragment]) -> Result<(), CompileError> {
    let Some(first) = fragments.first() else {
        return Ok(());
    };
    let expected = first.table().key_signature();
    for fragment in &fragments[1..] {
        let table = fragment.table();
        let found = table.key_signature();
        if found != expected {
            return Err(CompileError::SubjectShapeMismatch {
                table: table.table_id.clone(),
                expected: render_signature(&expected),
                found: render_signature(&found),
            });
        }
    }
    Ok(())
}

fn render_signature(sig: &[(&str, ValueKind)]) -> String {
    let fields: Vec<String> = sig.iter().map(|(n, k)| format!("{n}: {k}")).collect();
    format!("({})", fields.join(", "))
}
