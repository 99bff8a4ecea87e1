//! Listener registries
//!
//! Listeners are identified by their `Arc` allocation: registering the same
//! `Arc` twice delivers twice, and removal drops every entry sharing that
//! allocation. Dispatch always iterates over a snapshot, so a listener may
//! add or remove listeners (itself included) while being called.

use crate::message::Message;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::error;

/// Connection-status callback
pub type StatusListener = Arc<dyn Fn(bool) + Send + Sync>;

/// Inbound message callback
pub type MessageListener = Arc<dyn Fn(&Message) + Send + Sync>;

/// Ordered collection of listeners; insertion order is dispatch order
pub struct Registry<L: ?Sized> {
    entries: Vec<Arc<L>>,
}

impl<L: ?Sized> Registry<L> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn add(&mut self, listener: Arc<L>) {
        self.entries.push(listener);
    }

    /// Remove by identity; returns whether anything was removed
    pub fn remove(&mut self, listener: &Arc<L>) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| !same_listener(entry, listener));
        before != self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn snapshot(&self) -> Vec<Arc<L>> {
        self.entries.clone()
    }
}

impl<L: ?Sized> Default for Registry<L> {
    fn default() -> Self {
        Self::new()
    }
}

/// Compare allocations only; vtable pointers of `dyn` Arcs are not stable
fn same_listener<L: ?Sized>(a: &Arc<L>, b: &Arc<L>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Both registries owned by the manager
#[derive(Default)]
pub struct Listeners {
    pub status: Registry<dyn Fn(bool) + Send + Sync>,
    pub messages: Registry<dyn Fn(&Message) + Send + Sync>,
}

impl Listeners {
    pub fn clear(&mut self) {
        self.status.clear();
        self.messages.clear();
    }
}

/// Call every listener in order, isolating panics
///
/// Returns the number of listeners that panicked.
pub fn dispatch<L: ?Sized>(listeners: &[Arc<L>], what: &str, call: impl Fn(&L)) -> usize {
    let mut failures = 0;
    for listener in listeners {
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| call(&**listener))) {
            failures += 1;
            error!("Error in {} listener: {}", what, panic_message(&*panic));
        }
    }
    failures
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg
    } else {
        "non-string panic payload"
    }
}
