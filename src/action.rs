//! The action envelope: the unit of input delivered to every store.
//!
//! On the dispatcher boundary actions travel in a dynamic wire form, a
//! JSON object `{"type": <string>, "payload": <any>}`. Stores validate
//! the wire form before acting on it; anything else is rejected with
//! [`StoreError::InvalidAction`].

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::StoreError;

/// Immutable `{type, payload}` record.
///
/// Both fields are read-only after construction. Equality beyond field
/// access is not required anywhere in the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Action {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

impl Action {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    /// The action type, used to look up interested stores' handlers.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Parse the dynamic wire form.
    ///
    /// Rejects anything that is not an object with a string `type` and
    /// at most a `payload` field. A missing payload defaults to null.
    pub fn from_wire(wire: &Value) -> Result<Self, StoreError> {
        serde_json::from_value(wire.clone())
            .map_err(|err| StoreError::InvalidAction(err.to_string()))
    }

    /// The canonical wire form of this action.
    pub fn to_wire(&self) -> Value {
        json!({ "type": self.kind, "payload": self.payload })
    }
}
