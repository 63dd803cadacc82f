//! Membership transitions emitted by the engine.

use serde::{Deserialize, Serialize};

use crate::entity::{encode_subject, Entity};
use crate::subject::Subject;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Enter,
    Exit,
}

/// A transition of a raw subject, before encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectChange {
    pub change_type: ChangeType,
    pub subject: Subject,
}

impl SubjectChange {
    pub fn enter(subject: Subject) -> Self {
        Self {
            change_type: ChangeType::Enter,
            subject,
        }
    }

    pub fn exit(subject: Subject) -> Self {
        Self {
            change_type: ChangeType::Exit,
            subject,
        }
    }

    pub fn encode(&self) -> EntityChange {
        EntityChange {
            change_type: self.change_type,
            subject: encode_subject(&self.subject),
        }
    }
}

/// A transition as consumers see it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityChange {
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    pub subject: Entity,
}

impl EntityChange {
    pub fn enter(subject: Entity) -> Self {
        Self {
            change_type: ChangeType::Enter,
            subject,
        }
    }

    pub fn exit(subject: Entity) -> Self {
        Self {
            change_type: ChangeType::Exit,
            subject,
        }
    }
}
