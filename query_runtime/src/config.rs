//! Runtime configuration.

use serde::{Deserialize, Serialize};

use query_kernel::plan::CompileOptions;

use crate::error::RuntimeError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RuntimeConfig {
    /// Options applied to every query compiled against the store.
    pub compile: CompileOptions,
}

impl RuntimeConfig {
    /// Parse a JSON config. Missing fields take their defaults; unknown
    /// fields are rejected.
    pub fn from_json_str(json: &str) -> Result<Self, RuntimeError> {
        serde_json::from_str(json).map_err(|e| RuntimeError::Config(e.to_string()))
    }
}
