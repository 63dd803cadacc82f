//! Hand-written protobuf types for the write log.
//!
//! Uses prost derive macros for encode/decode without prost-build.
//!
//! ```text
//! message ProtoValue      { oneof kind { bool b = 1; sint64 int = 2; uint64 uint = 3; string text = 4; bytes bytes = 5; } }
//! message ProtoField      { string name = 1; ProtoValue value = 2; }
//! message ProtoWrite      { string table_id = 1; repeated ProtoValue key = 2; repeated ProtoField values = 3; bool delete = 4; }
//! message ProtoWriteBatch { uint64 sequence = 1; repeated ProtoWrite writes = 2; }
//! ```

use prost::Message;

// ── Values ─────────────────────────────────────────────────────

#[derive(Clone, PartialEq, Message)]
pub struct ProtoValue {
    #[prost(oneof = "ValueKindProto", tags = "1, 2, 3, 4, 5")]
    pub kind: Option<ValueKindProto>,
}

#[derive(Clone, PartialEq, prost::Oneof)]
pub enum ValueKindProto {
    #[prost(bool, tag = "1")]
    Bool(bool),
    #[prost(sint64, tag = "2")]
    Int(i64),
    #[prost(uint64, tag = "3")]
    Uint(u64),
    #[prost(string, tag = "4")]
    Text(String),
    #[prost(bytes, tag = "5")]
    Bytes(Vec<u8>),
}

#[derive(Clone, PartialEq, Message)]
pub struct ProtoField {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(message, optional, tag = "2")]
    pub value: Option<ProtoValue>,
}

// ── Writes ─────────────────────────────────────────────────────

#[derive(Clone, PartialEq, Message)]
pub struct ProtoWrite {
    #[prost(string, tag = "1")]
    pub table_id: String,
    #[prost(message, repeated, tag = "2")]
    pub key: Vec<ProtoValue>,
    #[prost(message, repeated, tag = "3")]
    pub values: Vec<ProtoField>,
    #[prost(bool, tag = "4")]
    pub delete: bool,
}

#[derive(Clone, PartialEq, Message)]
pub struct ProtoWriteBatch {
    #[prost(uint64, tag = "1")]
    pub sequence: u64,
    #[prost(message, repeated, tag = "2")]
    pub writes: Vec<ProtoWrite>,
}
