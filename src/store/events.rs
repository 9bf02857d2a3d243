//! Per-store local event channel.
//!
//! Two signals exist. `StateChanged` is internal: it fires synchronously
//! on every accepted mutation and is what the registry hooks to mark a
//! store dirty. `Changed` is public and batched: only the scheduler
//! fires it, at most once per store per tick.

use std::sync::Arc;

use crate::store::Store;

/// The two signals a store's local channel carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Internal; fires synchronously on every accepted mutation.
    StateChanged,
    /// Public; fired only by the scheduler, batched per tick.
    Changed,
}

/// Handle returned by `on`/`once`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

pub(crate) type ListenerFn = Arc<dyn Fn(&Store) + Send + Sync>;

struct ListenerEntry {
    id: ListenerId,
    once: bool,
    callback: ListenerFn,
}

/// Listener table for one store. Closures cannot be compared, so
/// unsubscription goes through the id handed out at subscription time.
#[derive(Default)]
pub(crate) struct SignalHub {
    next_id: u64,
    state_changed: Vec<ListenerEntry>,
    changed: Vec<ListenerEntry>,
}

impl SignalHub {
    pub(crate) fn subscribe(&mut self, signal: Signal, once: bool, callback: ListenerFn) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners_mut(signal).push(ListenerEntry { id, once, callback });
        id
    }

    /// Remove a listener; returns whether anything was removed.
    pub(crate) fn unsubscribe(&mut self, signal: Signal, id: ListenerId) -> bool {
        let listeners = self.listeners_mut(signal);
        let before = listeners.len();
        listeners.retain(|entry| entry.id != id);
        listeners.len() != before
    }

    /// Collect the callbacks to run for one emission, dropping `once`
    /// entries. The caller invokes them with no store lock held.
    pub(crate) fn collect(&mut self, signal: Signal) -> Vec<ListenerFn> {
        let listeners = self.listeners_mut(signal);
        let callbacks = listeners.iter().map(|e| Arc::clone(&e.callback)).collect();
        listeners.retain(|entry| !entry.once);
        callbacks
    }

    fn listeners_mut(&mut self, signal: Signal) -> &mut Vec<ListenerEntry> {
        match signal {
            Signal::StateChanged => &mut self.state_changed,
            Signal::Changed => &mut self.changed,
        }
    }
}
