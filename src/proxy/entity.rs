//! Entity wrappers: one per named registry entry.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use super::array::{ArrayProxy, ArrayTarget};
use super::element::ElementRef;
use super::scope::ScopeCore;
use super::{is_internal, Gettable, Settable, DOM_HANDLE, REGISTRY_FIELD, SET_PROPERTY};
use crate::commit::{InstanceGuard, StateUpdate};
use crate::value::{InstanceId, ObjId, ObjectRef, Value};

/// Cached state behind every [`EntityProxy`] handed out for one name.
pub(crate) struct EntityWrap {
    name: String,
    backing: ObjectRef,
    synced_from: Cell<ObjId>,
    synced_len: Cell<usize>,
}

impl EntityWrap {
    pub(crate) fn new(name: &str, entry: ObjectRef) -> Self {
        Self {
            name: name.to_owned(),
            synced_from: Cell::new(entry.id()),
            synced_len: Cell::new(entry.len()),
            backing: entry,
        }
    }

    pub(crate) fn backing(&self) -> &ObjectRef {
        &self.backing
    }

    /// The instance this wrapper currently stands for.
    pub(crate) fn instance(&self) -> InstanceId {
        match self.backing.instance_id() {
            Some(id) => id,
            None => {
                let id = InstanceId::fresh();
                self.backing.set_instance_id(Some(id));
                id
            }
        }
    }

    /// Pull in `entry` if it is a different object or has grown fields.
    pub(crate) fn resync(&self, entry: &ObjectRef) {
        if entry.id() != self.synced_from.get() || entry.len() > self.synced_len.get() {
            trace!(entity = %self.name, "resyncing entity wrapper");
            self.adopt(entry);
        }
    }

    /// Copy `entry`'s fields and instance into the backing object in place.
    pub(crate) fn adopt(&self, entry: &ObjectRef) {
        self.backing.assign_from(entry);
        self.synced_from.set(entry.id());
        self.synced_len.set(entry.len());
    }
}

/// What an entity read produced.
#[derive(Debug, Clone)]
pub enum EntityRead {
    Undefined,
    /// An override, a primitive, or an unwrapped DOM handle.
    Value(Value),
    Array(ArrayProxy),
    Element(ElementRef),
    Setter(PropertySetter),
}

impl EntityRead {
    /// Whether the property is absent.
    pub fn is_undefined(&self) -> bool {
        matches!(self, EntityRead::Undefined)
    }

    /// The plain value, if the read produced one.
    pub fn value(&self) -> Option<&Value> {
        match self {
            EntityRead::Value(v) => Some(v),
            _ => None,
        }
    }

    /// The array tracker, if the property is an array.
    pub fn into_array(self) -> Option<ArrayProxy> {
        match self {
            EntityRead::Array(a) => Some(a),
            _ => None,
        }
    }

    /// The `setProperty` callable, if this read produced it.
    pub fn into_setter(self) -> Option<PropertySetter> {
        match self {
            EntityRead::Setter(s) => Some(s),
            _ => None,
        }
    }

    /// The native element handle, if this read produced it.
    pub fn into_element(self) -> Option<ElementRef> {
        match self {
            EntityRead::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Collapse the read into a plain value.
    pub fn to_value(&self) -> Value {
        match self {
            EntityRead::Value(v) => v.clone(),
            EntityRead::Array(a) => Value::Array(a.backing()),
            EntityRead::Element(e) => e.handle().map(Value::Dom).unwrap_or_default(),
            EntityRead::Undefined | EntityRead::Setter(_) => Value::Null,
        }
    }
}

/// Read/write view of one registry entity.
#[derive(Clone)]
pub struct EntityProxy {
    core: Rc<ScopeCore>,
    wrap: Rc<EntityWrap>,
}

impl EntityProxy {
    pub(crate) fn new(core: Rc<ScopeCore>, wrap: Rc<EntityWrap>) -> Self {
        Self { core, wrap }
    }

    /// The entity's registry name.
    pub fn name(&self) -> &str {
        &self.wrap.name
    }

    /// The widget instance this accessor was created for.
    pub fn instance(&self) -> InstanceId {
        self.wrap.instance()
    }

    /// The object reads fall back to and writes land on.
    pub fn backing(&self) -> ObjectRef {
        self.wrap.backing.clone()
    }

    /// Whether both proxies share one cached wrapper.
    pub fn ptr_eq(&self, other: &EntityProxy) -> bool {
        Rc::ptr_eq(&self.wrap, &other.wrap)
    }

    /// The override for `prop` if one exists, else the stored field.
    pub fn effective(&self, prop: &str) -> Option<Value> {
        self.core
            .overrides
            .get(&self.wrap.name, self.instance(), prop)
            .or_else(|| self.wrap.backing.get(prop))
    }

    /// Shorthand for `get(prop).to_value()`.
    pub fn value(&self, prop: &str) -> Value {
        self.get(prop).to_value()
    }

    /// Fluent form of [`Settable::set`].
    pub fn set_property(&self, prop: &str, value: impl Into<Value>) -> bool {
        self.set(prop, value)
    }

    /// The lazily resolved rendered element of this instance.
    pub fn element(&self) -> ElementRef {
        self.core.elements.element(self.instance())
    }
}

impl Gettable for EntityProxy {
    type Output = EntityRead;

    fn get(&self, prop: &str) -> EntityRead {
        if prop == SET_PROPERTY {
            return EntityRead::Setter(PropertySetter {
                entity: self.clone(),
            });
        }
        if prop == DOM_HANDLE {
            return EntityRead::Element(self.element());
        }
        match self.effective(prop) {
            None => EntityRead::Undefined,
            Some(Value::Array(array)) => {
                let wrap = self.core.wrap_array(
                    &array,
                    ArrayTarget::Entity {
                        entity: self.wrap.clone(),
                        field: prop.to_owned(),
                    },
                );
                EntityRead::Array(ArrayProxy::new(self.core.clone(), wrap))
            }
            Some(other) => EntityRead::Value(other),
        }
    }
}

impl Settable for EntityProxy {
    /// Record an override, update the backing entity, and commit the change
    /// guarded by this wrapper's instance. A write from a wrapper whose
    /// instance no longer matches the committed entity is dropped at commit.
    fn set(&self, prop: &str, value: impl Into<Value>) -> bool {
        if is_internal(prop) || prop == SET_PROPERTY || prop == DOM_HANDLE {
            return false;
        }
        let value = value.into();
        let current = self.effective(prop);
        if current.as_ref().is_some_and(|cur| cur.same(&value)) {
            return false;
        }

        let name = self.wrap.name.as_str();
        let instance = self.instance();
        self.core.overrides.set(name, instance, prop, value.clone());
        self.wrap.backing.insert(prop, value.clone());
        if let Some(Value::Array(old)) = &current {
            self.core.forget_array(old.id());
        }

        let entity = vec![REGISTRY_FIELD.to_owned(), name.to_owned()];
        let mut path = entity.clone();
        path.push(prop.to_owned());
        self.core
            .commit(StateUpdate::set(path, value).guarded(InstanceGuard { entity, instance }));
        true
    }
}

impl fmt::Debug for EntityProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityProxy")
            .field("name", &self.wrap.name)
            .field("instance", &self.wrap.backing.instance_id())
            .finish()
    }
}

/// The reserved `setProperty` accessor.
#[derive(Clone)]
pub struct PropertySetter {
    entity: EntityProxy,
}

impl PropertySetter {
    /// Write `prop` on the entity.
    pub fn call(&self, prop: &str, value: impl Into<Value>) -> bool {
        self.entity.set(prop, value)
    }
}

impl fmt::Debug for PropertySetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PropertySetter({})", self.entity.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::store::CommitSink;
    use crate::commit::StateStore;
    use crate::proxy::Scope;
    use crate::value::DomHandle;
    use serde_json::json;

    fn page(json: serde_json::Value) -> (Scope, Rc<StateStore>) {
        let root = Value::from(json).as_object().cloned().unwrap_or_default();
        let store = Rc::new(StateStore::new(root.clone()));
        (Scope::new("page", root, store.clone()), store)
    }

    #[test]
    fn set_property_updates_and_commits_once() {
        let (scope, store) = page(json!({"Widgets": {"userList": {}}}));
        let list = scope.registry().entity("userList");
        let setter = list.get(SET_PROPERTY).into_setter().unwrap();

        assert!(setter.call("selectedId", 5));
        assert_eq!(list.value("selectedId").as_i64(), Some(5));
        assert_eq!(store.scheduled_count(), 1);

        assert!(!setter.call("selectedId", 5));
        assert_eq!(store.scheduled_count(), 1);

        store.flush();
        assert_eq!(
            store.lookup(&["Widgets", "userList", "selectedId"]).unwrap().as_i64(),
            Some(5)
        );
    }

    #[test]
    fn override_shadows_stored_value() {
        let (scope, _) = page(json!({"Widgets": {"label1": {"caption": "stored"}}}));
        let label = scope.registry().entity("label1");
        scope
            .overrides()
            .set("label1", label.instance(), "caption", Value::from("forced"));

        assert_eq!(label.value("caption").as_str(), Some("forced"));
        assert_eq!(label.backing().get("caption").unwrap().as_str(), Some("stored"));

        scope.clear();
        assert_eq!(label.value("caption").as_str(), Some("stored"));
    }

    #[test]
    fn internal_and_reserved_props_are_not_written() {
        let (scope, store) = page(json!({"Widgets": {"w": {}}}));
        let w = scope.registry().entity("w");
        assert!(!w.set("$parent", 1));
        assert!(!w.set("__id", 1));
        assert!(!w.set(SET_PROPERTY, 1));
        assert_eq!(store.scheduled_count(), 0);
    }

    #[test]
    fn dom_handles_pass_through_raw() {
        let (scope, _) = page(json!({"Widgets": {"w": {}}}));
        let w = scope.registry().entity("w");
        w.backing().insert("anchor", Value::Dom(DomHandle::new(7)));
        assert!(matches!(w.get("anchor"), EntityRead::Value(Value::Dom(_))));
    }

    #[test]
    fn native_element_is_memoized_and_resolves_later() {
        let (scope, _) = page(json!({"Widgets": {"w": {}}}));
        let w = scope.registry().entity("w");
        let first = w.get(DOM_HANDLE).into_element().unwrap();
        let second = w.get(DOM_HANDLE).into_element().unwrap();
        assert!(first.ptr_eq(&second));
        assert!(!first.is_resolved());

        scope.elements().attach(w.instance(), DomHandle::new(11));
        assert_eq!(second.handle(), Some(DomHandle::new(11)));
        assert_eq!(scope.elements().pending_count(w.instance()), 0);
    }

    #[test]
    fn stale_instance_write_is_dropped() {
        let (scope, store) = page(json!({"Widgets": {"grid": {"page": 1}}}));
        let old = scope.registry().entity("grid");

        // the host remounts `grid` with a new instance
        let fresh = ObjectRef::entity("grid");
        fresh.insert("page", Value::from(1));
        store.schedule(StateUpdate::set(
            vec![REGISTRY_FIELD.into(), "grid".into()],
            Value::Object(fresh.clone()),
        ));
        store.flush();

        old.set("page", 9);
        store.flush();

        let committed = store.lookup(&["Widgets", "grid"]).unwrap();
        assert_eq!(committed.as_object().unwrap().instance_id(), fresh.instance_id());
        assert_eq!(store.lookup(&["Widgets", "grid", "page"]).unwrap().as_i64(), Some(1));
        assert_eq!(store.dropped_count(), 1);
    }

    #[test]
    fn array_fields_are_tracked() {
        let (scope, store) = page(json!({"Widgets": {"chips": {"items": ["a"]}}}));
        let chips = scope.registry().entity("chips");
        let items = chips.get("items").into_array().unwrap();
        items.push(Value::from("b"));
        store.flush();
        assert_eq!(
            store.lookup(&["Widgets", "chips", "items"]).unwrap().to_json(),
            json!(["a", "b"])
        );
        // later reads keep returning the same tracker
        assert!(chips.get("items").into_array().unwrap().ptr_eq(&items));
    }
}
