//! Entity codec: subject → opaque identifier handed to consumers.
//!
//! Fields are rendered in key order and joined with `:`. Text fields
//! escape `\` and `:` so the join stays unambiguous. Encoding is one-way.
//!
//! Renderings:
//!   bool   `true` / `false`
//!   int    decimal
//!   uint   decimal
//!   bytes  `0x` + lowercase hex
//!   text   escaped string

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::subject::Subject;
use crate::value::Value;

pub const SEPARATOR: char = ':';

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entity(String);

impl Entity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&Subject> for Entity {
    fn from(subject: &Subject) -> Self {
        encode_subject(subject)
    }
}

pub fn encode_subject(subject: &Subject) -> Entity {
    let mut out = String::new();
    for (i, value) in subject.values().iter().enumerate() {
        if i > 0 {
            out.push(SEPARATOR);
        }
        render_value(&mut out, value);
    }
    Entity(out)
}

fn render_value(out: &mut String, value: &Value) {
    match value {
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Int(n) => out.push_str(&n.to_string()),
        Value::Uint(n) => out.push_str(&n.to_string()),
        Value::Bytes(bytes) => {
            out.push_str("0x");
            for b in bytes {
                out.push_str(&format!("{:02x}", b));
            }
        }
        Value::Text(s) => {
            for ch in s.chars() {
                if ch == '\\' || ch == SEPARATOR {
                    out.push('\\');
                }
                out.push(ch);
            }
        }
    }
}
