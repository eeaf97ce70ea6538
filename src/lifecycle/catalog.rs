//! Globally registered variables, the fallback set for pages whose app scope
//! is not ready yet.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::variable::{Variable, VariableKind};

#[derive(Default)]
struct Catalog {
    variables: IndexMap<String, Rc<Variable>>,
    actions: IndexMap<String, Rc<Variable>>,
}

/// Shared handle to the variable catalog. Clones address the same catalog.
#[derive(Clone, Default)]
pub struct VariableCatalog {
    inner: Rc<RefCell<Catalog>>,
}

impl VariableCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under the variable's name, in the table matching its kind.
    pub fn register(&self, variable: Rc<Variable>) {
        let mut inner = self.inner.borrow_mut();
        let table = match variable.kind() {
            VariableKind::Variable => &mut inner.variables,
            VariableKind::Action => &mut inner.actions,
        };
        table.insert(variable.name().to_owned(), variable);
    }

    /// Remove `variable` if it is the registered one for its name.
    pub fn unregister(&self, variable: &Rc<Variable>) -> bool {
        let mut inner = self.inner.borrow_mut();
        let table = match variable.kind() {
            VariableKind::Variable => &mut inner.variables,
            VariableKind::Action => &mut inner.actions,
        };
        match table.get(variable.name()) {
            Some(current) if Rc::ptr_eq(current, variable) => {
                table.shift_remove(variable.name());
                true
            }
            _ => false,
        }
    }

    /// Look up a registered variable.
    pub fn variable(&self, name: &str) -> Option<Rc<Variable>> {
        self.inner.borrow().variables.get(name).cloned()
    }

    /// Look up a registered action.
    pub fn action(&self, name: &str) -> Option<Rc<Variable>> {
        self.inner.borrow().actions.get(name).cloned()
    }

    /// All variables in registration order.
    pub fn variables(&self) -> Vec<Rc<Variable>> {
        self.inner.borrow().variables.values().cloned().collect()
    }

    /// All actions in registration order.
    pub fn actions(&self) -> Vec<Rc<Variable>> {
        self.inner.borrow().actions.values().cloned().collect()
    }

    /// Number of registered variables and actions.
    pub fn len(&self) -> usize {
        let inner = self.inner.borrow();
        inner.variables.len() + inner.actions.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for VariableCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("VariableCatalog")
            .field("variables", &inner.variables.keys().collect::<Vec<_>>())
            .field("actions", &inner.actions.keys().collect::<Vec<_>>())
            .finish()
    }
}
