use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::ModelError;

/// Identifier of the counter document. Doubles as its partition key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CounterId(String);

impl CounterId {
    pub fn new(id: impl Into<String>) -> Result<Self, ModelError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ModelError::Validation("counter id required".into()));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str { &self.0 }

    /// Partition key used for point reads and writes.
    pub fn partition_key(&self) -> &str { &self.0 }
}

impl fmt::Display for CounterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The persisted counter document.
///
/// Only `id`, `count` and `_etag` are interpreted; every other field the store
/// returns (`_rid`, `_ts`, `_self`, user fields) is carried through a replace
/// untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CounterDocument {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(rename = "_etag", default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CounterDocument {
    pub fn new(id: impl Into<String>, count: u64) -> Self {
        Self { id: id.into(), count: Some(count), etag: None, extra: Map::new() }
    }

    /// Current tally; a legacy document without `count` (or with `null`) starts at zero.
    pub fn current_count(&self) -> u64 {
        self.count.unwrap_or(0)
    }

    /// Bump `count` by one, returning the new value. `None` on overflow.
    pub fn increment(&mut self) -> Option<u64> {
        let next = self.current_count().checked_add(1)?;
        self.count = Some(next);
        Some(next)
    }
}
