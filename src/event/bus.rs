//! Scope-local publish/subscribe.
//!
//! [`EventBus`] carries signals between widgets that are not themselves
//! persisted state (e.g. "service error", "content ready"). Handlers run
//! synchronously inside [`notify`](EventBus::notify) in subscription order.
//! No bus borrow is held while a handler runs, so handlers may subscribe,
//! unsubscribe, or notify re-entrantly.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use slotmap::{new_key_type, SlotMap};

use crate::value::Value;

new_key_type! {
    /// Identifies one subscription on a bus.
    pub struct SubscriptionKey;
}

type Handler = Rc<dyn Fn(&Value)>;

struct Entry {
    event: String,
    seq: u64,
    handler: Handler,
}

#[derive(Default)]
struct BusInner {
    handlers: SlotMap<SubscriptionKey, Entry>,
    next_seq: u64,
}

/// Shared handle to a scope's event bus. Clones address the same bus.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Rc<RefCell<BusInner>>,
}

impl EventBus {
    /// Create a bus with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `event`.
    ///
    /// Dropping the returned [`Subscription`] does *not* unsubscribe; call
    /// [`Subscription::unsubscribe`] explicitly.
    pub fn subscribe(
        &self,
        event: impl Into<String>,
        handler: impl Fn(&Value) + 'static,
    ) -> Subscription {
        let mut inner = self.inner.borrow_mut();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        let key = inner.handlers.insert(Entry {
            event: event.into(),
            seq,
            handler: Rc::new(handler),
        });
        Subscription {
            bus: Rc::downgrade(&self.inner),
            key,
        }
    }

    /// Deliver `value` to every handler of `event`. Returns how many ran.
    pub fn notify(&self, event: &str, value: &Value) -> usize {
        // Slots are reused, so order by sequence rather than by slot.
        let mut handlers: Vec<(u64, Handler)> = self
            .inner
            .borrow()
            .handlers
            .values()
            .filter(|entry| entry.event == event)
            .map(|entry| (entry.seq, entry.handler.clone()))
            .collect();
        handlers.sort_unstable_by_key(|(seq, _)| *seq);
        for (_, handler) in &handlers {
            handler(value);
        }
        handlers.len()
    }

    /// Number of handlers registered for `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.inner
            .borrow()
            .handlers
            .values()
            .filter(|entry| entry.event == event)
            .count()
    }

    /// Total number of live subscriptions.
    pub fn len(&self) -> usize {
        self.inner.borrow().handlers.len()
    }

    /// Whether the bus has no subscriptions.
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().handlers.is_empty()
    }

    /// Remove every subscription.
    pub fn clear(&self) {
        self.inner.borrow_mut().handlers.clear();
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.len())
            .finish()
    }
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug)]
pub struct Subscription {
    bus: Weak<RefCell<BusInner>>,
    key: SubscriptionKey,
}

impl Subscription {
    /// The subscription's key.
    pub fn key(&self) -> SubscriptionKey {
        self.key
    }

    /// Remove the handler. Returns `false` if it was already gone (bus
    /// cleared or dropped).
    pub fn unsubscribe(self) -> bool {
        match self.bus.upgrade() {
            Some(inner) => inner.borrow_mut().handlers.remove(self.key).is_some(),
            None => false,
        }
    }
}
