//! Canonical hashing of matching sets.
//!
//! Deterministic canonical serialization + SHA-256.
//!
//! Rules:
//!   - Members encoded through the entity codec, then sorted (UTF-8 byte order)
//!   - Duplicates collapse
//!   - `hash_version` is the first field
//!   - Compact UTF-8 JSON, no whitespace

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::entity::{encode_subject, Entity};
use crate::subject::Subject;
use crate::HASH_VERSION;

/// Canonical JSON bytes of a set of entities.
pub fn canonical_serialize_entities<'a>(entities: impl IntoIterator<Item = &'a Entity>) -> Vec<u8> {
    let mut members: Vec<&str> = entities.into_iter().map(Entity::as_str).collect();
    members.sort_unstable();
    members.dedup();

    let mut root = Map::new();
    root.insert(
        "hash_version".to_string(),
        Value::Number(HASH_VERSION.into()),
    );
    root.insert(
        "members".to_string(),
        Value::Array(
            members
                .into_iter()
                .map(|m| Value::String(m.to_string()))
                .collect(),
        ),
    );
    Value::Object(root).to_string().into_bytes()
}

/// Canonical JSON bytes of a set of subjects.
pub fn canonical_serialize<'a>(subjects: impl IntoIterator<Item = &'a Subject>) -> Vec<u8> {
    let entities: Vec<Entity> = subjects.into_iter().map(encode_subject).collect();
    canonical_serialize_entities(&entities)
}

/// SHA-256 of the canonical serialization. Lowercase hex.
pub fn canonical_hash<'a>(subjects: impl IntoIterator<Item = &'a Subject>) -> String {
    hex_digest(&canonical_serialize(subjects))
}

pub fn canonical_hash_entities<'a>(entities: impl IntoIterator<Item = &'a Entity>) -> String {
    hex_digest(&canonical_serialize_entities(entities))
}

fn hex_digest(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<String>()
}
