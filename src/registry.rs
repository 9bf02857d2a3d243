//! The store registry: id table, key-ownership map, pending-change set.
//!
//! The registry is explicitly constructed and passed around rather than
//! living in hidden module state, so tests get isolation with a fresh
//! registry each. It is the long-lived owner of every store; stores are
//! never removed once created.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::dispatch::Dispatcher;
use crate::error::StoreError;
use crate::store::{Signal, Store, StoreId, StoreOptions};

#[derive(Default)]
struct RegistryInner {
    stores: HashMap<StoreId, Store>,
    key_owners: HashMap<String, StoreId>,
    /// Stores awaiting a batched notification, in first-dirty order.
    pending: Vec<StoreId>,
}

/// Process-wide (or test-local) table of stores and state-key owners.
///
/// Clones are handles onto the same registry.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store, wiring it into the dispatch and notification
    /// plumbing:
    ///
    /// 1. validates and builds the store from `options`;
    /// 2. registers its dispatch handler with `dispatcher`;
    /// 3. records it in the id table and claims key ownership for every
    ///    key present in its initial state;
    /// 4. hooks its internal state-changed signal to the pending set;
    /// 5. runs the store's `init` hook.
    ///
    /// Fails with [`StoreError::Configuration`] on inconsistent options.
    pub fn create_store(
        &self,
        options: StoreOptions,
        dispatcher: &dyn Dispatcher,
    ) -> Result<Store, StoreError> {
        let store = Store::from_options(options)?;

        let token = dispatcher.register(Box::new({
            let store = store.clone();
            move |wire| store.handle_dispatch(wire).map(|_| ())
        }));
        store.set_dispatch_token(token);

        let id = store.id();
        let initial_keys: Vec<String> =
            store.state().keys().map(str::to_owned).collect();
        {
            let mut inner = self.inner.write();
            inner.stores.insert(id, store.clone());
        }
        self.claim_keys(id, &initial_keys);

        // Every accepted mutation marks this store dirty; the scheduler
        // drains the pending set once per tick.
        let registry = self.clone();
        store.on(Signal::StateChanged, move |_| registry.mark_pending(id));

        store.init();
        Ok(store)
    }

    /// Claim ownership of state keys for a store. A later claim for an
    /// already-owned key wins; the steal is logged, not rejected.
    pub fn claim_keys(&self, id: StoreId, keys: &[String]) {
        let mut inner = self.inner.write();
        for key in keys {
            if let Some(previous) = inner.key_owners.insert(key.clone(), id) {
                if previous != id {
                    tracing::warn!(key = %key, old = %previous, new = %id, "state key ownership overwritten");
                }
            }
        }
    }

    /// The store currently owning a state key, if any.
    pub fn owner_of(&self, key: &str) -> Option<StoreId> {
        self.inner.read().key_owners.get(key).copied()
    }

    pub fn store(&self, id: StoreId) -> Option<Store> {
        self.inner.read().stores.get(&id).cloned()
    }

    pub fn store_count(&self) -> usize {
        self.inner.read().stores.len()
    }

    /// Mark a store dirty for the next notification flush. Duplicate
    /// marks within one tick are suppressed.
    pub fn mark_pending(&self, id: StoreId) {
        let mut inner = self.inner.write();
        if !inner.pending.contains(&id) {
            inner.pending.push(id);
        }
    }

    /// Take the pending set, leaving it empty. Order is first-dirty.
    pub fn drain_pending(&self) -> Vec<StoreId> {
        std::mem::take(&mut self.inner.write().pending)
    }

    pub fn pending_count(&self) -> usize {
        self.inner.read().pending.len()
    }
}
