//! The store: one unit of application state and its transition rules.
//!
//! A [`Store`] owns a slice of immutable state, a mapping from action
//! types to the methods that handle them, and a set of named methods
//! that are memoized against the current state snapshot. Mutations go
//! through [`Store::set_state`] / [`Store::replace_state`], which only
//! accept transitions that structurally change the snapshot.
//!
//! `Store` is a cheap clonable handle over shared inner state, the same
//! container shape as the rest of the crate; clones observe the same
//! store.

mod cache;
mod events;

pub use events::{ListenerId, Signal};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use uuid::Uuid;

use crate::action::Action;
use crate::dispatch::DispatchToken;
use crate::error::StoreError;
use crate::state::{ArgSig, Snapshot};
use cache::MethodCache;
use events::SignalHub;

/// Process-unique store identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreId(Uuid);

impl StoreId {
    pub(crate) fn generate() -> Self {
        StoreId(Uuid::new_v4())
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A store method: receives the store handle and the call arguments,
/// optionally returns a value. Dispatch handlers receive the action's
/// wire form as the sole argument.
pub type MethodFn = Arc<dyn Fn(&Store, &[Value]) -> Option<Value> + Send + Sync>;

type InitFn = Box<dyn FnOnce(&Store) + Send + Sync>;

#[derive(Clone)]
struct MethodEntry {
    func: MethodFn,
    cached: bool,
}

/// Construction options for [`crate::Registry::create_store`].
///
/// Whether each method is memoized is fixed here, at construction time:
/// `cache(false)` flips the store-wide default, and per-method
/// registration can override it either way.
#[derive(Default)]
pub struct StoreOptions {
    initial_state: Snapshot,
    interested_in: HashMap<String, String>,
    methods: Vec<(String, MethodFn, Option<bool>)>,
    cache_disabled: bool,
    on_init: Option<InitFn>,
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initial_state(mut self, snapshot: Snapshot) -> Self {
        self.initial_state = snapshot;
        self
    }

    /// Declare interest in an action type, naming the method to invoke.
    pub fn interest(mut self, action_kind: impl Into<String>, method: impl Into<String>) -> Self {
        self.interested_in.insert(action_kind.into(), method.into());
        self
    }

    /// Register a method that follows the store-wide cache default.
    pub fn method(
        mut self,
        name: impl Into<String>,
        func: impl Fn(&Store, &[Value]) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        self.methods.push((name.into(), Arc::new(func), None));
        self
    }

    /// Register a method that is always memoized.
    pub fn cached_method(
        mut self,
        name: impl Into<String>,
        func: impl Fn(&Store, &[Value]) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        self.methods.push((name.into(), Arc::new(func), Some(true)));
        self
    }

    /// Register a method that is never memoized.
    pub fn uncached_method(
        mut self,
        name: impl Into<String>,
        func: impl Fn(&Store, &[Value]) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        self.methods.push((name.into(), Arc::new(func), Some(false)));
        self
    }

    /// Store-wide memoization default for methods registered without an
    /// explicit override. Defaults to enabled.
    pub fn cache(mut self, enabled: bool) -> Self {
        self.cache_disabled = !enabled;
        self
    }

    /// Hook invoked once after full construction and registration,
    /// intended for setup work such as an initial fetch.
    pub fn on_init(mut self, hook: impl FnOnce(&Store) + Send + Sync + 'static) -> Self {
        self.on_init = Some(Box::new(hook));
        self
    }
}

struct StoreInner {
    id: StoreId,
    state: Snapshot,
    initial_state: Snapshot,
    interested_in: HashMap<String, String>,
    methods: HashMap<String, MethodEntry>,
    cache: MethodCache,
    hub: SignalHub,
    dispatch_token: Option<DispatchToken>,
    on_init: Option<InitFn>,
}

/// Handle to one store. Clones are cheap and observe the same state.
#[derive(Clone)]
pub struct Store {
    inner: Arc<RwLock<StoreInner>>,
}

impl Store {
    /// Build a store from validated options. Public construction goes
    /// through `Registry::create_store`, which also wires dispatch and
    /// notification plumbing.
    pub(crate) fn from_options(options: StoreOptions) -> Result<Self, StoreError> {
        let StoreOptions {
            initial_state,
            interested_in,
            methods,
            cache_disabled,
            on_init,
        } = options;

        let mut table = HashMap::new();
        for (name, func, cached) in methods {
            let cached = cached.unwrap_or(!cache_disabled);
            table.insert(name, MethodEntry { func, cached });
        }
        for (kind, method) in &interested_in {
            if !table.contains_key(method) {
                return Err(StoreError::Configuration(format!(
                    "interest in '{kind}' names unregistered method '{method}'"
                )));
            }
        }

        let id = StoreId::generate();
        tracing::debug!(store = %id, keys = initial_state.len(), "store constructed");
        Ok(Self {
            inner: Arc::new(RwLock::new(StoreInner {
                id,
                state: initial_state.clone(),
                initial_state,
                interested_in,
                methods: table,
                cache: MethodCache::default(),
                hub: SignalHub::default(),
                dispatch_token: None,
                on_init,
            })),
        })
    }

    pub fn id(&self) -> StoreId {
        self.inner.read().id
    }

    /// The current immutable snapshot.
    pub fn state(&self) -> Snapshot {
        self.inner.read().state.clone()
    }

    /// Read a single key out of the current snapshot.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.read().state.get(key).cloned()
    }

    /// The dispatcher registration handle; identity only.
    pub fn dispatch_token(&self) -> Option<DispatchToken> {
        self.inner.read().dispatch_token
    }

    pub(crate) fn set_dispatch_token(&self, token: DispatchToken) {
        self.inner.write().dispatch_token = Some(token);
    }

    /// Handle one dispatched wire value.
    ///
    /// Rejects malformed envelopes with [`StoreError::InvalidAction`].
    /// If this store is interested in the action's type, the mapped
    /// method runs synchronously with the envelope as sole argument;
    /// returns whether a method ran.
    pub fn handle_dispatch(&self, wire: &Value) -> Result<bool, StoreError> {
        let action = Action::from_wire(wire)?;
        let method = self.inner.read().interested_in.get(action.kind()).cloned();
        match method {
            Some(name) => {
                tracing::trace!(store = %self.id(), kind = action.kind(), method = %name, "dispatch handled");
                self.call(&name, &[action.to_wire()])?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Invoke a named method, through the memoization cache when the
    /// method was registered as cached.
    ///
    /// The cache key is the composite of the state signature at call
    /// time, the method name, and the structural argument signature. A
    /// hit returns the cached value without running the body; a miss
    /// runs the body and caches any `Some` result.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Option<Value>, StoreError> {
        let entry = self
            .inner
            .read()
            .methods
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::UnknownMethod(name.to_owned()))?;

        if !entry.cached {
            return Ok((entry.func)(self, args));
        }

        let state_sig = self.inner.read().state.signature();
        let arg_sig = ArgSig::of(args);
        if let Some(hit) = self.inner.read().cache.get(state_sig, name, arg_sig).cloned() {
            tracing::trace!(store = %self.id(), method = name, "memoization hit");
            return Ok(Some(hit));
        }

        // Body runs with no lock held; it may mutate this store. The
        // result is cached under the pre-call state signature.
        let result = (entry.func)(self, args);
        if let Some(value) = &result {
            self.inner.write().cache.insert(state_sig, name, arg_sig, value.clone());
        }
        Ok(result)
    }

    /// Shallow-merge `partial` into the current snapshot.
    ///
    /// Returns false without emitting anything when the merge result is
    /// structurally equal to the current state; otherwise swaps the
    /// snapshot, fires `Signal::StateChanged`, and returns true.
    pub fn set_state(&self, partial: Snapshot) -> bool {
        let next = self.inner.read().state.merge(&partial);
        self.commit(next)
    }

    /// Replace the snapshot wholesale, same no-op contract as
    /// [`Store::set_state`]. Keys absent from `full` are gone.
    pub fn replace_state(&self, full: Snapshot) -> bool {
        self.commit(full)
    }

    /// Reset to the snapshot captured at construction.
    pub fn clear_state(&self) -> bool {
        let initial = self.inner.read().initial_state.clone();
        self.commit(initial)
    }

    /// Discard every memoization partition for this store.
    pub fn clear_cache(&self) {
        self.inner.write().cache.clear();
    }

    /// [`Store::clear_cache`] then [`Store::clear_state`].
    pub fn clear(&self) {
        self.clear_cache();
        self.clear_state();
    }

    /// Subscribe to a signal. Returns the id used to unsubscribe.
    pub fn on(&self, signal: Signal, handler: impl Fn(&Store) + Send + Sync + 'static) -> ListenerId {
        self.inner.write().hub.subscribe(signal, false, Arc::new(handler))
    }

    /// Subscribe for a single emission.
    pub fn once(&self, signal: Signal, handler: impl Fn(&Store) + Send + Sync + 'static) -> ListenerId {
        self.inner.write().hub.subscribe(signal, true, Arc::new(handler))
    }

    /// Unsubscribe; returns whether the listener was present.
    pub fn off(&self, signal: Signal, id: ListenerId) -> bool {
        self.inner.write().hub.unsubscribe(signal, id)
    }

    /// Run the construction hook, at most once. Invoked by
    /// `Registry::create_store` after registration completes; calling
    /// again is a no-op.
    pub fn init(&self) {
        let hook = self.inner.write().on_init.take();
        if let Some(hook) = hook {
            hook(self);
        }
    }

    pub(crate) fn emit(&self, signal: Signal) {
        let callbacks = self.inner.write().hub.collect(signal);
        for callback in callbacks {
            callback(self);
        }
    }

    fn commit(&self, next: Snapshot) -> bool {
        let callbacks = {
            let mut inner = self.inner.write();
            if inner.state == next {
                return false;
            }
            tracing::debug!(store = %inner.id, "state transition accepted");
            inner.state = next;
            // Listeners run after the lock drops so they can read the
            // store freely.
            inner.hub.collect(Signal::StateChanged)
        };
        for callback in callbacks {
            callback(self);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn snap(value: Value) -> Snapshot {
        Snapshot::from_value(value).unwrap()
    }

    fn counting_listener() -> (Arc<AtomicUsize>, impl Fn(&Store) + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let handle = Arc::clone(&count);
        (count, move |_: &Store| {
            handle.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn plain_store(initial: Value) -> Store {
        Store::from_options(StoreOptions::new().initial_state(snap(initial))).unwrap()
    }

    #[test]
    fn captures_initial_state() {
        let store = plain_store(json!({"count": 0}));
        assert_eq!(store.state(), snap(json!({"count": 0})));
    }

    #[test]
    fn interest_must_name_a_registered_method() {
        let err = Store::from_options(StoreOptions::new().interest("x", "missing"));
        assert!(matches!(err, Err(StoreError::Configuration(_))));
    }

    #[test]
    fn set_state_merges_and_signals() {
        let store = plain_store(json!({"count": 0, "label": "a"}));
        let (fired, listener) = counting_listener();
        store.on(Signal::StateChanged, listener);

        assert!(store.set_state(snap(json!({"count": 1}))));
        assert_eq!(store.get("count"), Some(json!(1)));
        assert_eq!(store.get("label"), Some(json!("a")));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn set_state_with_equal_values_is_a_noop() {
        let store = plain_store(json!({"count": 0}));
        let (fired, listener) = counting_listener();
        store.on(Signal::StateChanged, listener);

        assert!(!store.set_state(snap(json!({"count": 0}))));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn replace_state_drops_old_keys() {
        let store = plain_store(json!({"count": 0, "test": true}));
        assert!(store.replace_state(snap(json!({"number": 1}))));
        assert_eq!(store.state(), snap(json!({"number": 1})));
    }

    #[test]
    fn replace_state_is_idempotent() {
        let store = plain_store(json!({"count": 0}));
        let (fired, listener) = counting_listener();
        store.on(Signal::StateChanged, listener);

        assert!(store.replace_state(snap(json!({"n": 1}))));
        assert!(!store.replace_state(snap(json!({"n": 1}))));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clear_state_resets_to_initial() {
        let store = plain_store(json!({"count": 0}));
        store.replace_state(snap(json!({"count": 5, "extra": 1})));
        assert!(store.clear_state());
        assert_eq!(store.state(), snap(json!({"count": 0})));
    }

    #[test]
    fn once_listener_fires_a_single_time() {
        let store = plain_store(json!({"n": 0}));
        let (fired, listener) = counting_listener();
        store.once(Signal::StateChanged, listener);

        store.set_state(snap(json!({"n": 1})));
        store.set_state(snap(json!({"n": 2})));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn off_removes_a_listener() {
        let store = plain_store(json!({"n": 0}));
        let (fired, listener) = counting_listener();
        let id = store.on(Signal::StateChanged, listener);

        assert!(store.off(Signal::StateChanged, id));
        store.set_state(snap(json!({"n": 1})));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    fn store_with_counter_method(cached: bool) -> (Store, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let runs_in_body = Arc::clone(&runs);
        let func = move |store: &Store, args: &[Value]| {
            runs_in_body.fetch_add(1, Ordering::SeqCst);
            let base = store.get("count").and_then(|v| v.as_i64()).unwrap_or(0);
            let offset = args.first().and_then(Value::as_i64).unwrap_or(0);
            Some(json!(base + offset))
        };
        let options = StoreOptions::new().initial_state(snap(json!({"count": 10})));
        let options = if cached {
            options.cached_method("total", func)
        } else {
            options.uncached_method("total", func)
        };
        (Store::from_options(options).unwrap(), runs)
    }

    #[test]
    fn cached_method_runs_once_per_state_and_args() {
        let (store, runs) = store_with_counter_method(true);
        let first = store.call("total", &[json!(5)]).unwrap();
        let second = store.call("total", &[json!(5)]).unwrap();
        assert_eq!(first, Some(json!(15)));
        assert_eq!(second, Some(json!(15)));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cached_method_distinguishes_arguments() {
        let (store, runs) = store_with_counter_method(true);
        assert_eq!(store.call("total", &[json!(1)]).unwrap(), Some(json!(11)));
        assert_eq!(store.call("total", &[json!(2)]).unwrap(), Some(json!(12)));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn state_change_invalidates_implicitly() {
        let (store, runs) = store_with_counter_method(true);
        assert_eq!(store.call("total", &[json!(0)]).unwrap(), Some(json!(10)));
        store.set_state(snap(json!({"count": 20})));
        assert_eq!(store.call("total", &[json!(0)]).unwrap(), Some(json!(20)));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn stale_partition_still_serves_after_state_returns() {
        let (store, runs) = store_with_counter_method(true);
        store.call("total", &[json!(0)]).unwrap();
        store.set_state(snap(json!({"count": 20})));
        store.call("total", &[json!(0)]).unwrap();
        // back to the original snapshot: the old partition is retained
        store.set_state(snap(json!({"count": 10})));
        assert_eq!(store.call("total", &[json!(0)]).unwrap(), Some(json!(10)));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn uncached_method_runs_every_call() {
        let (store, runs) = store_with_counter_method(false);
        store.call("total", &[json!(0)]).unwrap();
        store.call("total", &[json!(0)]).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn store_wide_cache_flag_applies_to_plain_methods() {
        let runs = Arc::new(AtomicUsize::new(0));
        let runs_in_body = Arc::clone(&runs);
        let store = Store::from_options(
            StoreOptions::new()
                .cache(false)
                .method("probe", move |_, _| {
                    runs_in_body.fetch_add(1, Ordering::SeqCst);
                    Some(json!(1))
                }),
        )
        .unwrap();
        store.call("probe", &[]).unwrap();
        store.call("probe", &[]).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn none_results_are_not_cached() {
        let runs = Arc::new(AtomicUsize::new(0));
        let runs_in_body = Arc::clone(&runs);
        let store = Store::from_options(StoreOptions::new().cached_method("noop", move |_, _| {
            runs_in_body.fetch_add(1, Ordering::SeqCst);
            None
        }))
        .unwrap();
        store.call("noop", &[]).unwrap();
        store.call("noop", &[]).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn clear_cache_forces_reexecution() {
        let (store, runs) = store_with_counter_method(true);
        store.call("total", &[json!(0)]).unwrap();
        store.clear_cache();
        store.call("total", &[json!(0)]).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unknown_method_errors() {
        let store = plain_store(json!({}));
        assert!(matches!(
            store.call("missing", &[]),
            Err(StoreError::UnknownMethod(_))
        ));
    }

    #[test]
    fn handle_dispatch_rejects_malformed_envelopes() {
        let store = plain_store(json!({}));
        assert!(matches!(
            store.handle_dispatch(&json!("not an action")),
            Err(StoreError::InvalidAction(_))
        ));
    }

    #[test]
    fn handle_dispatch_invokes_the_interested_method() {
        let store = Store::from_options(
            StoreOptions::new()
                .initial_state(snap(json!({"count": 0})))
                .interest("counter/add", "add")
                .uncached_method("add", |store, args| {
                    let action = Action::from_wire(&args[0]).ok()?;
                    let delta = action.payload().as_i64().unwrap_or(0);
                    let count = store.get("count").and_then(|v| v.as_i64()).unwrap_or(0);
                    store.set_state(
                        Snapshot::from_value(json!({"count": count + delta})).ok()?,
                    );
                    None
                }),
        )
        .unwrap();

        let handled = store
            .handle_dispatch(&Action::new("counter/add", json!(3)).to_wire())
            .unwrap();
        assert!(handled);
        assert_eq!(store.get("count"), Some(json!(3)));
    }

    #[test]
    fn handle_dispatch_ignores_uninterested_types() {
        let store = plain_store(json!({"count": 0}));
        let handled = store
            .handle_dispatch(&Action::new("other/action", json!(null)).to_wire())
            .unwrap();
        assert!(!handled);
    }

    #[test]
    fn store_handle_crosses_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        // the scheduler thread and dispatch listeners both share handles
        assert_send_sync::<Store>();
        assert_send_sync::<StoreOptions>();
    }

    #[test]
    fn init_hook_runs_at_most_once() {
        let (fired, _listener) = counting_listener();
        let handle = Arc::clone(&fired);
        let store = Store::from_options(StoreOptions::new().on_init(move |_| {
            handle.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();
        store.init();
        store.init();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
