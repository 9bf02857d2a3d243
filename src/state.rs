//! Immutable state snapshots and structural signatures.
//!
//! A [`Snapshot`] is a key→value mapping over JSON-shaped values. It is
//! never mutated in place: every transition builds a new snapshot, and
//! stores compare old and new structurally to decide whether anything
//! actually changed.
//!
//! Signatures ([`StateSig`], [`ArgSig`]) are deterministic structural
//! hashes used as memoization-cache keys. Two structurally equal values
//! always produce the same signature regardless of object identity.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StoreError;

/// Immutable key→value snapshot of one store's state.
///
/// Backed by `serde_json::Map`, which iterates keys in sorted order, so
/// signatures are insertion-order independent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    entries: Map<String, Value>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from a JSON object value.
    ///
    /// Fails with [`StoreError::Configuration`] for any non-object value;
    /// state is always a key→value mapping.
    pub fn from_value(value: Value) -> Result<Self, StoreError> {
        match value {
            Value::Object(entries) => Ok(Self { entries }),
            other => Err(StoreError::Configuration(format!(
                "state must be a JSON object, got {other}"
            ))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Shallow merge: keys from `partial` overwrite keys in `self`,
    /// untouched keys carry over. Returns a new snapshot.
    pub fn merge(&self, partial: &Snapshot) -> Snapshot {
        let mut entries = self.entries.clone();
        for (key, value) in &partial.entries {
            entries.insert(key.clone(), value.clone());
        }
        Snapshot { entries }
    }

    /// Deterministic structural signature of this snapshot.
    ///
    /// An empty snapshot maps to the [`StateSig::Empty`] sentinel.
    pub fn signature(&self) -> StateSig {
        if self.entries.is_empty() {
            return StateSig::Empty;
        }
        let mut hasher = DefaultHasher::new();
        for (key, value) in &self.entries {
            key.hash(&mut hasher);
            hash_value(value, &mut hasher);
        }
        StateSig::Hash(hasher.finish())
    }
}

impl TryFrom<Value> for Snapshot {
    type Error = StoreError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Snapshot::from_value(value)
    }
}

impl FromIterator<(String, Value)> for Snapshot {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Structural signature of a state snapshot; one memoization partition
/// exists per distinct signature. The empty snapshot gets its own
/// variant so no hash value can collide with the sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateSig {
    /// Sentinel partition for an empty/absent snapshot.
    Empty,
    Hash(u64),
}

/// Structural, order-sensitive signature of a method's argument tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArgSig(u64);

impl ArgSig {
    pub fn of(args: &[Value]) -> Self {
        let mut hasher = DefaultHasher::new();
        hasher.write_usize(args.len());
        for arg in args {
            hash_value(arg, &mut hasher);
        }
        ArgSig(hasher.finish())
    }
}

/// Hash a JSON value structurally. Each variant feeds a discriminant so
/// e.g. `"1"` and `1` cannot collide trivially; object keys arrive in
/// sorted order from `serde_json::Map`.
fn hash_value<H: Hasher>(value: &Value, hasher: &mut H) {
    match value {
        Value::Null => hasher.write_u8(0),
        Value::Bool(b) => {
            hasher.write_u8(1);
            hasher.write_u8(*b as u8);
        }
        Value::Number(n) => {
            hasher.write_u8(2);
            n.to_string().hash(hasher);
        }
        Value::String(s) => {
            hasher.write_u8(3);
            s.hash(hasher);
        }
        Value::Array(items) => {
            hasher.write_u8(4);
            hasher.write_usize(items.len());
            for item in items {
                hash_value(item, hasher);
            }
        }
        Value::Object(entries) => {
            hasher.write_u8(5);
            hasher.write_usize(entries.len());
            for (key, item) in entries {
                key.hash(hasher);
                hash_value(item, hasher);
            }
        }
    }
}
