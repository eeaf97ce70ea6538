//! The root scope handle used for global script access.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::proxy::{Scope, ScopeProxy};

/// Handle to the currently active page scope.
///
/// Activating a page replaces the handle's contents wholesale; releasing a
/// scope clears the handle only if that scope is still the active one.
#[derive(Clone, Default)]
pub struct RootHandle {
    current: Rc<RefCell<Option<Scope>>>,
}

impl RootHandle {
    /// Create a handle with no active scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `scope` the active root.
    pub fn activate(&self, scope: &Scope) {
        debug!(scope = scope.name(), "root handle activated");
        *self.current.borrow_mut() = Some(scope.clone());
    }

    /// Clear the handle if it points at `scope`.
    pub fn release(&self, scope: &Scope) -> bool {
        let active = self
            .current
            .borrow()
            .as_ref()
            .is_some_and(|cur| cur.ptr_eq(scope));
        if active {
            *self.current.borrow_mut() = None;
        }
        active
    }

    /// Root wrapper of the active scope.
    pub fn current(&self) -> Option<ScopeProxy> {
        self.current.borrow().as_ref().map(Scope::proxy)
    }

    /// Name of the active root scope.
    pub fn current_name(&self) -> Option<String> {
        self.current
            .borrow()
            .as_ref()
            .map(|scope| scope.name().to_owned())
    }

    /// Whether `scope` is the active root.
    pub fn is_active(&self, scope: &Scope) -> bool {
        self.current
            .borrow()
            .as_ref()
            .is_some_and(|cur| cur.ptr_eq(scope))
    }
}

impl fmt::Debug for RootHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RootHandle")
            .field(&self.current_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::StateStore;
    use crate::value::ObjectRef;

    fn scope(name: &str) -> Scope {
        let root = ObjectRef::new();
        Scope::new(name, root.clone(), Rc::new(StateStore::new(root)))
    }

    #[test]
    fn activate_replaces_previous() {
        let root = RootHandle::new();
        let a = scope("A");
        let b = scope("B");
        root.activate(&a);
        root.activate(&b);
        assert_eq!(root.current_name().as_deref(), Some("B"));
        assert!(root.is_active(&b));
    }

    #[test]
    fn release_ignores_inactive_scope() {
        let root = RootHandle::new();
        let a = scope("A");
        let b = scope("B");
        root.activate(&b);
        assert!(!root.release(&a));
        assert!(root.current().is_some());
        assert!(root.release(&b));
        assert!(root.current().is_none());
    }
}
