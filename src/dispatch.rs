//! The dispatcher boundary.
//!
//! The engine only consumes [`Dispatcher::register`]: every store hands
//! the dispatcher a handler at construction time and receives an opaque
//! token back. Delivery must be synchronous — the dispatching caller
//! blocks until every registered handler has run.
//!
//! [`FanoutDispatcher`] is the reference implementation for tests and
//! small embeddings; any collaborator honoring the same contract works.

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use crate::action::Action;
use crate::error::StoreError;

/// Handler invoked with the wire form of every dispatched action.
pub type DispatchHandler = Box<dyn Fn(&Value) -> Result<(), StoreError> + Send + Sync>;

/// Opaque registration handle. Identity only; never interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DispatchToken(u64);

impl DispatchToken {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// A dispatcher delivers every dispatched action synchronously to every
/// registered handler.
pub trait Dispatcher {
    fn register(&self, handler: DispatchHandler) -> DispatchToken;
}

/// Synchronous fan-out dispatcher: delivers to handlers in registration
/// order, stopping at the first handler error.
#[derive(Clone, Default)]
pub struct FanoutDispatcher {
    inner: Arc<RwLock<FanoutInner>>,
}

#[derive(Default)]
struct FanoutInner {
    next_token: u64,
    handlers: Vec<(DispatchToken, Arc<DispatchHandler>)>,
}

impl FanoutDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an action to every registered handler, in registration
    /// order, on the calling thread.
    pub fn dispatch(&self, action: &Action) -> Result<(), StoreError> {
        self.dispatch_wire(&action.to_wire())
    }

    /// Deliver a raw wire value. Handlers themselves validate the shape,
    /// so a malformed value surfaces as [`StoreError::InvalidAction`]
    /// from the first store it reaches.
    pub fn dispatch_wire(&self, wire: &Value) -> Result<(), StoreError> {
        // Snapshot the handler list so delivery runs without the lock
        // held; handlers mutate stores and may log freely.
        let handlers: Vec<Arc<DispatchHandler>> = {
            let inner = self.inner.read();
            inner.handlers.iter().map(|(_, h)| Arc::clone(h)).collect()
        };
        for handler in handlers {
            handler(wire)?;
        }
        Ok(())
    }

    pub fn handler_count(&self) -> usize {
        self.inner.read().handlers.len()
    }
}

impl Dispatcher for FanoutDispatcher {
    fn register(&self, handler: DispatchHandler) -> DispatchToken {
        let mut inner = self.inner.write();
        let token = DispatchToken(inner.next_token);
        inner.next_token += 1;
        inner.handlers.push((token, Arc::new(handler)));
        tracing::debug!(token = token.raw(), "dispatch handler registered");
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    #[test]
    fn tokens_are_distinct() {
        let dispatcher = FanoutDispatcher::new();
        let a = dispatcher.register(Box::new(|_| Ok(())));
        let b = dispatcher.register(Box::new(|_| Ok(())));
        assert_ne!(a, b);
        assert_eq!(dispatcher.handler_count(), 2);
    }

    #[test]
    fn delivers_in_registration_order() {
        let dispatcher = FanoutDispatcher::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let seen = Arc::clone(&seen);
            dispatcher.register(Box::new(move |_| {
                seen.lock().push(tag);
                Ok(())
            }));
        }
        dispatcher.dispatch(&Action::new("ping", json!(null))).unwrap();
        assert_eq!(*seen.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn stops_at_first_handler_error() {
        let dispatcher = FanoutDispatcher::new();
        let reached = Arc::new(Mutex::new(false));
        dispatcher.register(Box::new(|_| {
            Err(StoreError::InvalidAction("boom".into()))
        }));
        {
            let reached = Arc::clone(&reached);
            dispatcher.register(Box::new(move |_| {
                *reached.lock() = true;
                Ok(())
            }));
        }
        let err = dispatcher.dispatch(&Action::new("ping", json!(null)));
        assert!(matches!(err, Err(StoreError::InvalidAction(_))));
        assert!(!*reached.lock());
    }
}
