//! Observers - synchronous multi-subscriber fan-out
//!
//! Callbacks run on the emitting task, in registration order. A panicking
//! callback is caught and logged; the others still run and the emitter
//! never sees the panic.

use crate::lock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, Weak};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Registry<T> {
    next_id: u64,
    entries: Vec<(u64, Callback<T>)>,
}

/// A list of callbacks for one event type.
pub struct Observers<T> {
    registry: Arc<Mutex<Registry<T>>>,
    name: &'static str,
}

impl<T: 'static> Observers<T> {
    pub fn new(name: &'static str) -> Self {
        Self { registry: Arc::new(Mutex::new(Registry { next_id: 0, entries: Vec::new() })), name }
    }

    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let mut registry = lock(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.entries.push((id, Arc::new(callback)));

        let weak: Weak<Mutex<Registry<T>>> = Arc::downgrade(&self.registry);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(registry) = weak.upgrade() {
                    lock(&registry).entries.retain(|(entry, _)| *entry != id);
                }
            })),
        }
    }

    /// Call every observer with `value`. Returns how many were called.
    pub fn emit(&self, value: &T) -> usize {
        // Snapshot so callbacks may (un)subscribe without deadlocking.
        let callbacks: Vec<Callback<T>> =
            lock(&self.registry).entries.iter().map(|(_, cb)| cb.clone()).collect();
        for callback in &callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(value))).is_err() {
                tracing::error!(observer = self.name, "observer panicked; ignoring");
            }
        }
        callbacks.len()
    }

    pub fn len(&self) -> usize { lock(&self.registry).entries.len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

/// Handle returned by every `on_*` registration.
///
/// Dropping it keeps the observer registered; call [`unsubscribe`](Self::unsubscribe)
/// to remove it.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("active", &self.cancel.is_some()).finish()
    }
}
