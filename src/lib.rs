//! `lode` — a minimal unidirectional state-store engine.
//!
//! Independent stores hold immutable state, react to a single stream of
//! typed actions, memoize derived computations against the current
//! state snapshot, and notify consumers through a batched, tick-coalesced
//! notification channel.
//!
//! # Architecture
//!
//! ```text
//! Action ──→ Dispatcher ──→ Store.handle_dispatch ──→ set/replace_state
//!                                                          │
//!                                   "state changed" (sync)  │
//!                                                          ▼
//!                       Registry.pending ──→ Scheduler.tick ──→ "changed"
//!                                                          │
//!                                                          ▼
//!                                                    StateBinding
//! ```
//!
//! - a dispatched action reaches every registered store synchronously;
//! - an interested store runs the mapped method, which mutates state;
//! - an accepted mutation marks the store dirty in its [`Registry`];
//! - the [`Scheduler`] flushes once per tick: each dirty store emits one
//!   public `Changed` signal, however many mutations occurred;
//! - a [`StateBinding`] connects a consumer to the stores owning its
//!   required keys.
//!
//! The engine is logically single-threaded: dispatch, mutation, and
//! memoization are synchronous on the calling thread. The only
//! asynchronous boundary is the scheduler tick.
//!
//! # Example
//!
//! ```
//! use lode::{Action, FanoutDispatcher, Registry, Scheduler, Snapshot, StoreOptions};
//! use serde_json::json;
//!
//! let registry = Registry::new();
//! let dispatcher = FanoutDispatcher::new();
//!
//! let counter = registry.create_store(
//!     StoreOptions::new()
//!         .initial_state(Snapshot::from_value(json!({"count": 0}))?)
//!         .interest("counter/add", "add")
//!         .uncached_method("add", |store, args| {
//!             let action = Action::from_wire(&args[0]).ok()?;
//!             let delta = action.payload().as_i64()?;
//!             let count = store.get("count")?.as_i64()?;
//!             store.set_state(Snapshot::from_value(json!({"count": count + delta})).ok()?);
//!             None
//!         }),
//!     &dispatcher,
//! )?;
//!
//! dispatcher.dispatch(&Action::new("counter/add", json!(2)))?;
//! assert_eq!(counter.get("count"), Some(json!(2)));
//!
//! // batched notification: one "changed" per store per tick
//! let scheduler = Scheduler::new(registry.clone());
//! scheduler.tick();
//! # Ok::<(), lode::StoreError>(())
//! ```

mod action;
mod binder;
mod dispatch;
mod error;
mod registry;
mod scheduler;
mod state;
mod store;

pub use action::Action;
pub use binder::StateBinding;
pub use dispatch::{DispatchHandler, DispatchToken, Dispatcher, FanoutDispatcher};
pub use error::StoreError;
pub use registry::Registry;
pub use scheduler::Scheduler;
pub use state::{ArgSig, Snapshot, StateSig};
pub use store::{ListenerId, MethodFn, Signal, Store, StoreId, StoreOptions};
