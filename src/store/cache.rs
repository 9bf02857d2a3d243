//! Per-store memoization cache.
//!
//! Nested mapping: state signature → method name → argument signature →
//! cached return value. Invalidation is implicit — a new state snapshot
//! lands in a new partition — and old partitions are retained until an
//! explicit clear. That unbounded growth is a documented caller
//! responsibility, not a detected failure.

use std::collections::HashMap;

use serde_json::Value;

use crate::state::{ArgSig, StateSig};

#[derive(Default)]
pub(crate) struct MethodCache {
    partitions: HashMap<StateSig, HashMap<String, HashMap<ArgSig, Value>>>,
}

impl MethodCache {
    pub(crate) fn get(&self, state: StateSig, method: &str, args: ArgSig) -> Option<&Value> {
        self.partitions.get(&state)?.get(method)?.get(&args)
    }

    pub(crate) fn insert(&mut self, state: StateSig, method: &str, args: ArgSig, value: Value) {
        self.partitions
            .entry(state)
            .or_default()
            .entry(method.to_owned())
            .or_default()
            .insert(args, value);
    }

    /// Discard every partition.
    pub(crate) fn clear(&mut self) {
        self.partitions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Snapshot;
    use serde_json::json;

    fn sig(value: serde_json::Value) -> StateSig {
        Snapshot::from_value(value).unwrap().signature()
    }

    #[test]
    fn miss_then_hit() {
        let mut cache = MethodCache::default();
        let state = sig(json!({"a": 1}));
        let args = ArgSig::of(&[json!(1)]);
        assert!(cache.get(state, "total", args).is_none());
        cache.insert(state, "total", args, json!(42));
        assert_eq!(cache.get(state, "total", args), Some(&json!(42)));
    }

    #[test]
    fn partitions_are_isolated_by_state() {
        let mut cache = MethodCache::default();
        let args = ArgSig::of(&[]);
        cache.insert(sig(json!({"a": 1})), "total", args, json!(1));
        assert!(cache.get(sig(json!({"a": 2})), "total", args).is_none());
    }

    #[test]
    fn methods_are_isolated_within_a_partition() {
        let mut cache = MethodCache::default();
        let state = sig(json!({"a": 1}));
        let args = ArgSig::of(&[]);
        cache.insert(state, "total", args, json!(1));
        assert!(cache.get(state, "count", args).is_none());
    }

    #[test]
    fn clear_discards_everything() {
        let mut cache = MethodCache::default();
        let state = sig(json!({"a": 1}));
        let args = ArgSig::of(&[]);
        cache.insert(state, "total", args, json!(1));
        cache.clear();
        assert!(cache.get(state, "total", args).is_none());
    }
}
