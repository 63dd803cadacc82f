//! Query compiler tests.

mod common;

use query_kernel::error::CompileError;
use query_kernel::plan::{compile, compile_with, ConditionOp, CompileOptions};
use query_kernel::schema::TableId;
use query_kernel::subject::field_values;
use query_kernel::value::{Value, ValueKind};
use query_kernel::{has, has_value, not, not_value};

use common::{health_table, position, position_table, terrain_table};

#[test]
fn has_and_not_split_into_from_and_except() {
    let pos = position_table();
    let hp = health_table();
    let plan = compile(&[has(&pos), not(&hp)]).expect("compile");

    assert_eq!(plan.from_tables().len(), 1);
    assert_eq!(plan.from_tables()[0].table_id, TableId::from("Position"));
    assert_eq!(plan.from_tables()[0].subject_fields, vec!["player".to_string()]);
    assert_eq!(plan.except_tables().len(), 1);
    assert_eq!(plan.except_tables()[0].table_id, TableId::from("Health"));
    assert!(plan.conditions().is_empty());
}

#[test]
fn has_value_emits_one_eq_condition_per_field() {
    let pos = position_table();
    let plan = compile(&[has_value(&pos, position(3, 5))]).expect("compile");

    assert_eq!(plan.from_tables().len(), 1);
    let conds = plan.conditions();
    assert_eq!(conds.len(), 2);
    assert!(conds.iter().all(|c| c.op == ConditionOp::Eq));
    assert_eq!(conds[0].field, "x");
    assert_eq!(conds[0].right, Value::Int(3));
    assert_eq!(conds[1].field, "y");
    assert_eq!(conds[1].right, Value::Int(5));
}

#[test]
fn not_value_requires_the_row_and_emits_ne() {
    let hp = health_table();
    let plan = compile(&[not_value(&hp, field_values([("health", 0u64)]))]).expect("compile");

    assert_eq!(plan.from_tables().len(), 1);
    assert_eq!(plan.from_tables()[0].table_id, TableId::from("Health"));
    assert!(plan.except_tables().is_empty());
    assert_eq!(plan.conditions().len(), 1);
    assert_eq!(plan.conditions()[0].op, ConditionOp::Ne);
}

#[test]
fn repeated_table_appears_once_in_from() {
    let pos = position_table();
    let plan = compile(&[has(&pos), has_value(&pos, position(1, 2))]).expect("compile");
    assert_eq!(plan.from_tables().len(), 1);
    assert_eq!(plan.conditions().len(), 2);
}

#[test]
fn referenced_tables_cover_all_clauses() {
    let pos = position_table();
    let hp = health_table();
    let plan = compile(&[has_value(&pos, position(0, 0)), not(&hp)]).expect("compile");
    let tables: Vec<String> = plan
        .referenced_tables()
        .into_iter()
        .map(|t| t.to_string())
        .collect();
    assert_eq!(tables, vec!["Health".to_string(), "Position".to_string()]);
}

#[test]
fn empty_from_is_rejected() {
    let hp = health_table();
    assert_eq!(compile(&[]), Err(CompileError::EmptyFrom));
    assert_eq!(compile(&[not(&hp)]), Err(CompileError::EmptyFrom));
}

#[test]
fn unknown_field_is_rejected() {
    let pos = position_table();
    let err = compile(&[has_value(&pos, field_values([("z", 1i64)]))]).unwrap_err();
    assert_eq!(
        err,
        CompileError::UnknownField {
            table: TableId::from("Position"),
            field: "z".to_string(),
        }
    );
}

#[test]
fn kind_mismatch_is_rejected() {
    let pos = position_table();
    let err = compile(&[has_value(&pos, field_values([("x", "three")]))]).unwrap_err();
    assert_eq!(
        err,
        CompileError::FieldKindMismatch {
            table: TableId::from("Position"),
            field: "x".to_string(),
            expected: ValueKind::Int,
            found: ValueKind::Text,
        }
    );
}

#[test]
fn required_and_excluded_table_is_rejected() {
    let pos = position_table();
    let err = compile(&[has(&pos), not(&pos)]).unwrap_err();
    assert_eq!(
        err,
        CompileError::ContradictoryPresence {
            table: TableId::from("Position"),
        }
    );
}

#[test]
fn subject_shapes_unchecked_by_default() {
    let pos = position_table();
    let terrain = terrain_table();
    assert!(compile(&[has(&pos), has(&terrain)]).is_ok());
}

#[test]
fn strict_subject_shapes_rejects_mismatched_keys() {
    let pos = position_table();
    let hp = health_table();
    let terrain = terrain_table();
    let strict = CompileOptions {
        strict_subject_shapes: true,
    };

    assert!(compile_with(&[has(&pos), not(&hp)], &strict).is_ok());

    let err = compile_with(&[has(&pos), has(&terrain)], &strict).unwrap_err();
    assert_eq!(
        err,
        CompileError::SubjectShapeMismatch {
            table: TableId::from("Terrain"),
            expected: "(player: text)".to_string(),
            found: "(x: int, y: int)".to_string(),
        }
    );
}

#[test]
fn compile_options_deserialize_with_defaults() {
    let opts: CompileOptions = serde_json::from_str("{}").expect("parse");
    assert_eq!(opts, CompileOptions::default());
    let strict: CompileOptions =
        serde_json::from_str(r#"{"strict_subject_shapes":true}"#).expect("parse");
    assert!(strict.strict_subject_shapes);
    assert!(serde_json::from_str::<CompileOptions>(r#"{"bogus":1}"#).is_err());
}
