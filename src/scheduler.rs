//! Batched change-notification scheduler.
//!
//! One flush ("tick") emits the public `Changed` signal exactly once
//! for every store marked dirty since the previous tick, in first-dirty
//! order, then clears the pending set. Any number of synchronous
//! mutations between ticks therefore collapses into a single downstream
//! notification per store — the engine's only batching mechanism.
//!
//! The scheduler is an explicit object with a lifecycle: embedders call
//! [`Scheduler::start`] with a frame period to drive ticks from a
//! background thread, and [`Scheduler::stop`] to shut it down; tests
//! call [`Scheduler::tick`] directly for deterministic advancement.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::registry::Registry;
use crate::store::Signal;

pub struct Scheduler {
    registry: Registry,
    running: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Run one flush: notify every pending store once, then clear.
    pub fn tick(&self) {
        flush(&self.registry);
    }

    /// Spawn a background thread ticking at `interval` (~16ms for
    /// frame-rate behaviour). No-op if already running.
    pub fn start(&mut self, interval: Duration) {
        if self.worker.is_some() {
            return;
        }
        self.running.store(true, Ordering::SeqCst);
        let registry = self.registry.clone();
        let running = Arc::clone(&self.running);
        tracing::debug!(?interval, "notification scheduler started");
        self.worker = Some(thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                flush(&registry);
                thread::sleep(interval);
            }
        }));
    }

    /// Stop and join the background thread. Pending marks survive a
    /// stop; they flush on the next tick, manual or restarted.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
            tracing::debug!("notification scheduler stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn flush(registry: &Registry) {
    let pending = registry.drain_pending();
    if pending.is_empty() {
        return;
    }
    tracing::trace!(stores = pending.len(), "notification flush");
    for id in pending {
        if let Some(store) = registry.store(id) {
            store.emit(Signal::Changed);
        }
    }
}
