//! Store fixtures shared by the runtime tests.

#![allow(dead_code)]

use std::sync::Arc;

use query_kernel::entity::{encode_subject, Entity};
use query_kernel::schema::{FieldDef, TableSchema};
use query_kernel::subject::{FieldValues, Subject};
use query_kernel::value::{Value, ValueKind};

use query_runtime::{EntityChange, RuntimeConfig, TableStore, TableWrite};

pub struct World {
    pub store: TableStore,
    pub position: Arc<TableSchema>,
    pub health: Arc<TableSchema>,
    pub terrain: Arc<TableSchema>,
}

pub fn schemas() -> Vec<TableSchema> {
    vec![
        TableSchema::new(
            "Position",
            vec![FieldDef::new("player", ValueKind::Text)],
            vec![
                FieldDef::new("x", ValueKind::Int),
                FieldDef::new("y", ValueKind::Int),
            ],
        ),
        TableSchema::new(
            "Health",
            vec![FieldDef::new("player", ValueKind::Text)],
            vec![FieldDef::new("health", ValueKind::Uint)],
        ),
        TableSchema::new(
            "Terrain",
            vec![
                FieldDef::new("x", ValueKind::Int),
                FieldDef::new("y", ValueKind::Int),
            ],
            vec![FieldDef::new("terrain_type", ValueKind::Uint)],
        ),
    ]
}

/// Register the three tables on `store`.
pub fn world_on(store: TableStore) -> World {
    let mut registered = schemas()
        .into_iter()
        .map(|s| store.register_table(s).expect("register"));
    let position = registered.next().expect("position");
    let health = registered.next().expect("health");
    let terrain = registered.next().expect("terrain");
    World {
        store,
        position,
        health,
        terrain,
    }
}

/// A hydrated, empty world.
pub fn world() -> World {
    world_on(TableStore::hydrated(RuntimeConfig::default()))
}

/// A hydrated world seeded with the scenario rows:
/// alice(1,1) hp 10, bob(3,5) hp 0, carol(3,5), dave(7,7).
pub fn seeded_world() -> World {
    let w = world();
    w.store
        .apply(vec![
            set_position("alice", 1, 1),
            set_position("bob", 3, 5),
            set_position("carol", 3, 5),
            set_position("dave", 7, 7),
            set_health("alice", 10),
            set_health("bob", 0),
        ])
        .expect("seed");
    w
}

pub fn player(name: &str) -> Subject {
    Subject::new(vec![Value::Text(name.to_string())])
}

pub fn position(x: i64, y: i64) -> FieldValues {
    FieldValues::from([("x".to_string(), Value::Int(x)), ("y".to_string(), Value::Int(y))])
}

pub fn health(h: u64) -> FieldValues {
    FieldValues::from([("health".to_string(), Value::Uint(h))])
}

pub fn set_position(name: &str, x: i64, y: i64) -> TableWrite {
    TableWrite::set("Position", player(name), position(x, y))
}

pub fn set_health(name: &str, h: u64) -> TableWrite {
    TableWrite::set("Health", player(name), health(h))
}

pub fn set_terrain(x: i64, y: i64, kind: u64) -> TableWrite {
    TableWrite::set(
        "Terrain",
        cell(x, y),
        FieldValues::from([("terrain_type".to_string(), Value::Uint(kind))]),
    )
}

pub fn entities(names: &[&str]) -> Vec<Entity> {
    names.iter().map(|n| entity(n)).collect()
}

pub fn entity(name: &str) -> Entity {
    encode_subject(&player(name))
}

pub fn cell(x: i64, y: i64) -> Subject {
    Subject::from_iter([x, y])
}

pub fn enter(name: &str) -> EntityChange {
    EntityChange::enter(entity(name))
}

pub fn exit(name: &str) -> EntityChange {
    EntityChange::exit(entity(name))
}
