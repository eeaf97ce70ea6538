//! The entity registry wrapper.

use std::fmt;
use std::rc::Rc;

use tracing::debug;

use super::entity::{EntityProxy, EntityWrap};
use super::scope::ScopeCore;
use super::{Gettable, Settable, REGISTRY_FIELD};
use crate::commit::StateUpdate;
use crate::value::{InstanceId, ObjectRef, Value};

/// Read/write view of a scope's `Widgets` registry.
///
/// Reading a missing name synthesizes a minimal `{ name }` entry so scripts
/// can address entities that are not mounted yet. Entity wrappers are cached
/// per name and kept in sync with the raw entry.
#[derive(Clone)]
pub struct RegistryProxy {
    core: Rc<ScopeCore>,
}

impl RegistryProxy {
    pub(crate) fn new(core: Rc<ScopeCore>) -> Self {
        Self { core }
    }

    /// The raw registry object, created on first use.
    pub fn raw(&self) -> ObjectRef {
        match self.core.root.get(REGISTRY_FIELD) {
            Some(Value::Object(registry)) => registry,
            _ => {
                let registry = ObjectRef::new();
                self.core
                    .root
                    .insert(REGISTRY_FIELD, Value::Object(registry.clone()));
                registry
            }
        }
    }

    /// Whether an entry named `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        self.raw().contains_key(name)
    }

    /// Names of every registered entity.
    pub fn names(&self) -> Vec<String> {
        self.raw().keys()
    }

    /// Number of cached entity wrappers.
    pub fn cached_count(&self) -> usize {
        self.core.entities.borrow().len()
    }

    /// The wrapper for `name`, auto-vivifying the entry.
    pub fn entity(&self, name: &str) -> EntityProxy {
        let raw = self.raw();
        let entry = match raw.get(name) {
            Some(Value::Object(entry)) => entry,
            _ => {
                let entry = ObjectRef::entity(name);
                raw.insert(name, Value::Object(entry.clone()));
                entry
            }
        };
        if entry.instance_id().is_none() {
            entry.set_instance_id(Some(InstanceId::fresh()));
        }

        let cached = self.core.entities.borrow().get(name).cloned();
        let wrap = match cached {
            Some(wrap) => {
                wrap.resync(&entry);
                wrap
            }
            None => {
                let wrap = Rc::new(EntityWrap::new(name, entry));
                self.core
                    .entities
                    .borrow_mut()
                    .insert(name.to_owned(), wrap.clone());
                wrap
            }
        };
        EntityProxy::new(self.core.clone(), wrap)
    }

    /// Remove `name`: raw entry, cached wrapper, overrides and element.
    /// Wrappers still held elsewhere become stale.
    pub fn unmount(&self, name: &str) -> bool {
        let removed = self.raw().remove(name);
        let wrap = self.core.entities.borrow_mut().remove(name);
        let instance = wrap.as_ref().map(|w| w.instance()).or_else(|| {
            removed
                .as_ref()
                .and_then(|v| v.as_object().and_then(ObjectRef::instance_id))
        });
        if let Some(instance) = instance {
            self.core.overrides.clear_entity(name, instance);
            self.core.elements.detach(instance);
        }
        if removed.is_none() && wrap.is_none() {
            return false;
        }
        debug!(scope = %self.core.name, entity = name, "entity unmounted");
        self.core.commit(StateUpdate::Remove {
            path: vec![REGISTRY_FIELD.to_owned(), name.to_owned()],
        });
        true
    }
}

impl Gettable for RegistryProxy {
    type Output = EntityProxy;

    fn get(&self, name: &str) -> EntityProxy {
        self.entity(name)
    }
}

impl Settable for RegistryProxy {
    /// Replace the raw entry for `name`. A cached wrapper adopts the new
    /// entry's fields and instance in place, so existing holders see it.
    fn set(&self, name: &str, value: impl Into<Value>) -> bool {
        let value = value.into();
        let raw = self.raw();
        if raw.get(name).is_some_and(|cur| cur.same(&value)) {
            return false;
        }
        if let Value::Object(entry) = &value {
            if entry.instance_id().is_none() {
                entry.set_instance_id(Some(InstanceId::fresh()));
            }
        }
        raw.insert(name, value.clone());

        match &value {
            Value::Object(entry) => {
                let cached = self.core.entities.borrow().get(name).cloned();
                match cached {
                    Some(wrap) => wrap.adopt(entry),
                    None => {
                        self.core
                            .entities
                            .borrow_mut()
                            .insert(name.to_owned(), Rc::new(EntityWrap::new(name, entry.clone())));
                    }
                }
            }
            _ => {
                self.core.entities.borrow_mut().remove(name);
            }
        }

        self.core.commit(StateUpdate::set(
            vec![REGISTRY_FIELD.to_owned(), name.to_owned()],
            value,
        ));
        true
    }
}

impl fmt::Debug for RegistryProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryProxy")
            .field("scope", &self.core.name)
            .field("cached", &self.cached_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::StateStore;
    use crate::proxy::Scope;
    use serde_json::json;

    fn page(json: serde_json::Value) -> (Scope, Rc<StateStore>) {
        let root = Value::from(json).as_object().cloned().unwrap_or_default();
        let store = Rc::new(StateStore::new(root.clone()));
        (Scope::new("page", root, store.clone()), store)
    }

    #[test]
    fn missing_entity_is_vivified_without_commit() {
        let (scope, store) = page(json!({"Widgets": {}}));
        let registry = scope.registry();
        let ghost = registry.entity("notYetMounted");
        assert_eq!(ghost.value("name").as_str(), Some("notYetMounted"));
        assert!(registry.contains("notYetMounted"));
        assert_eq!(store.scheduled_count(), 0);
    }

    #[test]
    fn registry_is_created_lazily() {
        let (scope, _) = page(json!({}));
        assert!(scope.registry().names().is_empty());
        assert!(scope.backing().contains_key(REGISTRY_FIELD));
    }

    #[test]
    fn entity_wrapper_is_cached() {
        let (scope, _) = page(json!({"Widgets": {"a": {}}}));
        let registry = scope.registry();
        assert!(registry.entity("a").ptr_eq(&registry.get("a")));
        assert_eq!(registry.cached_count(), 1);
    }

    #[test]
    fn replaced_entry_is_resynced_into_cached_wrapper() {
        let (scope, _) = page(json!({"Widgets": {"a": {"v": 1}}}));
        let registry = scope.registry();
        let held = registry.entity("a");

        // the widget re-registers itself behind the wrapper's back
        let next = ObjectRef::entity("a");
        next.insert("v", Value::from(2));
        next.insert("extra", Value::from(true));
        registry.raw().insert("a", Value::Object(next.clone()));

        let again = registry.entity("a");
        assert!(again.ptr_eq(&held));
        assert_eq!(held.value("v").as_i64(), Some(2));
        assert_eq!(held.value("extra").as_bool(), Some(true));
        assert_eq!(held.instance(), next.instance_id().unwrap());
    }

    #[test]
    fn set_updates_cached_wrapper_in_place() {
        let (scope, store) = page(json!({"Widgets": {"a": {"v": 1}}}));
        let registry = scope.registry();
        let held = registry.entity("a");
        let replacement = Value::from(json!({"v": 5}));

        assert!(registry.set("a", replacement.clone()));
        assert!(!registry.set("a", replacement));
        assert_eq!(held.value("v").as_i64(), Some(5));
        assert_eq!(store.scheduled_count(), 1);
    }

    #[test]
    fn set_without_cache_builds_wrapper() {
        let (scope, _) = page(json!({"Widgets": {}}));
        let registry = scope.registry();
        registry.set("b", Value::from(json!({"v": 1})));
        assert_eq!(registry.cached_count(), 1);
        assert_eq!(registry.entity("b").value("v").as_i64(), Some(1));
    }

    #[test]
    fn unmount_makes_old_wrapper_stale() {
        let (scope, store) = page(json!({"Widgets": {"w": {"v": 1}}}));
        let registry = scope.registry();
        let old = registry.entity("w");
        old.set("v", 2);
        assert!(registry.unmount("w"));
        assert!(!registry.unmount("w"));
        assert!(scope.overrides().is_empty());

        registry.set("w", Value::from(json!({"v": 10})));
        store.flush();
        old.set("v", 3);
        store.flush();

        assert_eq!(store.lookup(&["Widgets", "w", "v"]).unwrap().as_i64(), Some(10));
        assert!(!registry.entity("w").ptr_eq(&old));
    }
}
