//! Rendered-element handles, resolved lazily per entity instance.
//!
//! The host calls [`ElementRegistry::attach`] once an entity's element is
//! mounted. Script code may ask for the element earlier; it then receives an
//! unresolved [`ElementRef`] that fills in on attach. Each instance gets one
//! memoized reference and its pending callbacks run at most once.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::value::{DomHandle, InstanceId};

/// Lazily resolved reference to an entity's rendered element.
#[derive(Clone, Default)]
pub struct ElementRef(Rc<RefCell<Option<DomHandle>>>);

impl ElementRef {
    /// The element, once mounted.
    pub fn handle(&self) -> Option<DomHandle> {
        *self.0.borrow()
    }

    /// Whether the element has been attached.
    pub fn is_resolved(&self) -> bool {
        self.0.borrow().is_some()
    }

    /// Whether both refer to the same memoized slot.
    pub fn ptr_eq(&self, other: &ElementRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn resolve(&self, handle: DomHandle) {
        *self.0.borrow_mut() = Some(handle);
    }
}

impl fmt::Debug for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ElementRef").field(&self.handle()).finish()
    }
}

type Pending = Box<dyn FnOnce(DomHandle)>;

#[derive(Default)]
struct Elements {
    mounted: HashMap<InstanceId, DomHandle>,
    pending: HashMap<InstanceId, Vec<Pending>>,
    resolved: HashMap<InstanceId, ElementRef>,
}

/// Per-scope table of mounted elements and callbacks waiting for them.
#[derive(Default)]
pub struct ElementRegistry {
    inner: RefCell<Elements>,
}

impl ElementRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The memoized element reference for `instance`.
    pub fn element(&self, instance: InstanceId) -> ElementRef {
        if let Some(existing) = self.inner.borrow().resolved.get(&instance) {
            return existing.clone();
        }
        let element = ElementRef::default();
        self.inner
            .borrow_mut()
            .resolved
            .insert(instance, element.clone());
        let target = element.clone();
        self.when_attached(instance, move |handle| target.resolve(handle));
        element
    }

    /// Run `f` with the element of `instance`: now if mounted, else on attach.
    pub fn when_attached(&self, instance: InstanceId, f: impl FnOnce(DomHandle) + 'static) {
        let mounted = self.inner.borrow().mounted.get(&instance).copied();
        match mounted {
            Some(handle) => f(handle),
            None => self
                .inner
                .borrow_mut()
                .pending
                .entry(instance)
                .or_default()
                .push(Box::new(f)),
        }
    }

    /// The host mounted `instance` as `handle`.
    pub fn attach(&self, instance: InstanceId, handle: DomHandle) {
        let callbacks = {
            let mut inner = self.inner.borrow_mut();
            inner.mounted.insert(instance, handle);
            inner.pending.remove(&instance).unwrap_or_default()
        };
        trace!(%instance, callbacks = callbacks.len(), "element attached");
        for callback in callbacks {
            callback(handle);
        }
    }

    /// The host unmounted `instance`.
    pub fn detach(&self, instance: InstanceId) {
        let mut inner = self.inner.borrow_mut();
        inner.mounted.remove(&instance);
        inner.pending.remove(&instance);
        inner.resolved.remove(&instance);
    }

    /// Whether `instance` has an attached element.
    pub fn is_attached(&self, instance: InstanceId) -> bool {
        self.inner.borrow().mounted.contains_key(&instance)
    }

    /// Number of callbacks still waiting for `instance`.
    pub fn pending_count(&self, instance: InstanceId) -> usize {
        self.inner
            .borrow()
            .pending
            .get(&instance)
            .map_or(0, Vec::len)
    }

    /// Drop every attached element.
    pub fn clear(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.mounted.clear();
        inner.pending.clear();
        inner.resolved.clear();
    }
}

impl fmt::Debug for ElementRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("ElementRegistry")
            .field("mounted", &inner.mounted.len())
            .field("pending", &inner.pending.len())
            .finish()
    }
}
