//! Proto ↔ store write conversion.
//!
//! Decoding is strict: a value without a kind, a field without a value,
//! or a delete carrying values is rejected rather than defaulted.

use query_kernel::schema::TableId;
use query_kernel::subject::{FieldValues, Subject};
use query_kernel::value::Value;

use crate::proto_types::{ProtoField, ProtoValue, ProtoWrite, ProtoWriteBatch, ValueKindProto};
use crate::store::TableWrite;
use crate::write_log::WriteLogError;

pub fn value_to_proto(value: &Value) -> ProtoValue {
    let kind = match value {
        Value::Bool(b) => ValueKindProto::Bool(*b),
        Value::Int(n) => ValueKindProto::Int(*n),
        Value::Uint(n) => ValueKindProto::Uint(*n),
        Value::Text(s) => ValueKindProto::Text(s.clone()),
        Value::Bytes(b) => ValueKindProto::Bytes(b.clone()),
    };
    ProtoValue { kind: Some(kind) }
}

pub fn proto_to_value(proto: &ProtoValue) -> Result<Value, WriteLogError> {
    match &proto.kind {
        Some(ValueKindProto::Bool(b)) => Ok(Value::Bool(*b)),
        Some(ValueKindProto::Int(n)) => Ok(Value::Int(*n)),
        Some(ValueKindProto::Uint(n)) => Ok(Value::Uint(*n)),
        Some(ValueKindProto::Text(s)) => Ok(Value::Text(s.clone())),
        Some(ValueKindProto::Bytes(b)) => Ok(Value::Bytes(b.clone())),
        None => Err(WriteLogError::Bridge("value has no kind".to_string())),
    }
}

pub fn write_to_proto(write: &TableWrite) -> ProtoWrite {
    match write {
        TableWrite::Set {
            table_id,
            key,
            values,
        } => ProtoWrite {
            table_id: table_id.to_string(),
            key: key.values().iter().map(value_to_proto).collect(),
            values: values
                .iter()
                .map(|(name, value)| ProtoField {
                    name: name.clone(),
                    value: Some(value_to_proto(value)),
                })
                .collect(),
            delete: false,
        },
        TableWrite::Delete { table_id, key } => ProtoWrite {
            table_id: table_id.to_string(),
            key: key.values().iter().map(value_to_proto).collect(),
            values: Vec::new(),
            delete: true,
        },
    }
}

pub fn proto_to_write(proto: &ProtoWrite) -> Result<TableWrite, WriteLogError> {
    let table_id = TableId::new(proto.table_id.clone());
    let key = proto
        .key
        .iter()
        .map(proto_to_value)
        .collect::<Result<Vec<_>, _>>()
        .map(Subject::new)?;

    if proto.delete {
        if !proto.values.is_empty() {
            return Err(WriteLogError::Bridge(format!(
                "delete on {} carries {} values",
                table_id,
                proto.values.len()
            )));
        }
        return Ok(TableWrite::Delete { table_id, key });
    }

    let mut values = FieldValues::new();
    for field in &proto.values {
        let value = field.value.as_ref().ok_or_else(|| {
            WriteLogError::Bridge(format!("field {}.{} has no value", table_id, field.name))
        })?;
        values.insert(field.name.clone(), proto_to_value(value)?);
    }
    Ok(TableWrite::Set {
        table_id,
        key,
        values,
    })
}

pub fn batch_to_proto(sequence: u64, writes: &[TableWrite]) -> ProtoWriteBatch {
    ProtoWriteBatch {
        sequence,
        writes: writes.iter().map(write_to_proto).collect(),
    }
}
