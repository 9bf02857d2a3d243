//! Consumer binding: connect a component-like consumer to the stores
//! that own its required state keys.
//!
//! A [`StateBinding`] resolves the owning store for each declared key,
//! reads an initial local snapshot, and subscribes a refresh callback to
//! each distinct owning store's public `Changed` signal. Dropping the
//! binding unsubscribes everything, so a consumer's lifetime is the
//! binding's lifetime.

use std::sync::Arc;

use crate::registry::Registry;
use crate::state::Snapshot;
use crate::store::{ListenerId, Signal, Store};

pub struct StateBinding {
    registry: Registry,
    keys: Vec<String>,
    subscriptions: Vec<(Store, ListenerId)>,
}

impl StateBinding {
    /// Bind `refresh` to every distinct store owning one of `keys`.
    ///
    /// Keys without a current owner are skipped with a warning; they
    /// simply stay absent from [`StateBinding::read`] until rebinding.
    pub fn bind(
        registry: &Registry,
        keys: impl IntoIterator<Item = impl Into<String>>,
        refresh: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        let refresh = Arc::new(refresh);

        let mut owners: Vec<Store> = Vec::new();
        for key in &keys {
            let Some(id) = registry.owner_of(key) else {
                tracing::warn!(key = %key, "no store owns required key");
                continue;
            };
            let Some(store) = registry.store(id) else {
                continue;
            };
            if !owners.iter().any(|s| s.id() == id) {
                owners.push(store);
            }
        }

        let subscriptions = owners
            .into_iter()
            .map(|store| {
                let refresh = Arc::clone(&refresh);
                let listener = store.on(Signal::Changed, move |_| refresh());
                (store, listener)
            })
            .collect();

        Self {
            registry: registry.clone(),
            keys,
            subscriptions,
        }
    }

    /// Build the consumer's local snapshot: each required key read from
    /// its current owning store.
    pub fn read(&self) -> Snapshot {
        self.keys
            .iter()
            .filter_map(|key| {
                let store = self.registry.store(self.registry.owner_of(key)?)?;
                Some((key.clone(), store.get(key)?))
            })
            .collect()
    }

    /// Number of distinct stores this binding listens to.
    pub fn store_count(&self) -> usize {
        self.subscriptions.len()
    }
}

impl Drop for StateBinding {
    fn drop(&mut self) {
        for (store, listener) in self.subscriptions.drain(..) {
            store.off(Signal::Changed, listener);
        }
    }
}
