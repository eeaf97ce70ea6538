//! Scope wrappers and the scope listener surface.
//!
//! A [`Scope`] owns one backing root object plus everything needed to
//! intercept access to it: the wrapper arena, the array marker set, the entity
//! cache, the override and element registries, and the event bus.
//! [`ScopeProxy`] is the read/write view of one object inside that tree.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, warn};

use super::arena::{WrapperArena, WrapperKey};
use super::array::{ArrayProxy, ArrayTarget, ArrayWrap};
use super::element::ElementRegistry;
use super::entity::EntityWrap;
use super::overrides::OverrideRegistry;
use super::registry::RegistryProxy;
use super::{Gettable, Settable, EVAL_HOOK, REGISTRY_FIELD};
use crate::commit::{CommitSink, StatePath, StateUpdate};
use crate::event::{EventBus, Subscription};
use crate::value::{ArrayRef, ObjId, ObjectRef, Value};

/// Errors surfaced by [`Scope::eval`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("script failed: {0}")]
    Script(String),
    #[error("scope `{0}` has been torn down")]
    Released(String),
}

/// Link from an embedded component's scope to its entity in the owner scope.
struct OwnerLink {
    core: Weak<ScopeCore>,
    entity: String,
}

pub(crate) struct ScopeCore {
    pub(crate) name: String,
    pub(crate) root: ObjectRef,
    pub(crate) sink: Rc<dyn CommitSink>,
    pub(crate) arena: RefCell<WrapperArena>,
    pub(crate) arrays: RefCell<HashMap<ObjId, Rc<ArrayWrap>>>,
    pub(crate) entities: RefCell<HashMap<String, Rc<EntityWrap>>>,
    pub(crate) overrides: OverrideRegistry,
    pub(crate) elements: ElementRegistry,
    pub(crate) bus: EventBus,
    owner: RefCell<Option<OwnerLink>>,
    alive: Cell<bool>,
}

impl ScopeCore {
    /// Forward `update` to the host unless the scope is torn down.
    pub(crate) fn commit(&self, update: StateUpdate) {
        if self.alive.get() {
            self.sink.schedule(update);
        } else {
            debug!(scope = %self.name, "commit after teardown ignored");
        }
    }

    /// The array wrapper for `array`, reused if it is already wrapped.
    pub(crate) fn wrap_array(&self, array: &ArrayRef, target: ArrayTarget) -> Rc<ArrayWrap> {
        if let Some(existing) = self.arrays.borrow().get(&array.id()) {
            return existing.clone();
        }
        let wrap = Rc::new(ArrayWrap::new(array.clone(), target));
        self.arrays.borrow_mut().insert(array.id(), wrap.clone());
        wrap
    }

    pub(crate) fn forget_array(&self, id: ObjId) {
        self.arrays.borrow_mut().remove(&id);
    }

    fn mirror_to_owner(&self, field: &str, value: &Value) {
        let owner = self.owner.borrow();
        let Some(link) = owner.as_ref() else {
            return;
        };
        let Some(owner_core) = link.core.upgrade() else {
            return;
        };
        let cached = owner_core.entities.borrow().get(&link.entity).cloned();
        if let Some(wrap) = cached {
            wrap.backing().insert(field, value.clone());
        }
    }
}

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

/// One state scope (app, page or prefab) and its listener surface.
#[derive(Clone)]
pub struct Scope {
    pub(crate) core: Rc<ScopeCore>,
}

impl Scope {
    /// Create a scope over `root`, committing through `sink`.
    pub fn new(name: impl Into<String>, root: ObjectRef, sink: Rc<dyn CommitSink>) -> Self {
        let arena = WrapperArena::new(root.clone());
        Self {
            core: Rc::new(ScopeCore {
                name: name.into(),
                root,
                sink,
                arena: RefCell::new(arena),
                arrays: RefCell::new(HashMap::new()),
                entities: RefCell::new(HashMap::new()),
                overrides: OverrideRegistry::new(),
                elements: ElementRegistry::new(),
                bus: EventBus::new(),
                owner: RefCell::new(None),
                alive: Cell::new(true),
            }),
        }
    }

    /// The scope name.
    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// The backing root object.
    pub fn backing(&self) -> ObjectRef {
        self.core.root.clone()
    }

    /// Wrapper over the scope root.
    pub fn proxy(&self) -> ScopeProxy {
        let key = self.core.arena.borrow().root();
        ScopeProxy {
            core: self.core.clone(),
            key,
            target: self.core.root.clone(),
            path: Vec::new(),
        }
    }

    /// Wrapper over the entity registry.
    pub fn registry(&self) -> RegistryProxy {
        RegistryProxy::new(self.core.clone())
    }

    /// Script-forced entity values.
    pub fn overrides(&self) -> &OverrideRegistry {
        &self.core.overrides
    }

    /// Native element handles by entity.
    pub fn elements(&self) -> &ElementRegistry {
        &self.core.elements
    }

    /// A handle to the scope's event bus.
    pub fn bus(&self) -> EventBus {
        self.core.bus.clone()
    }

    /// Subscribe `handler` to `event` on the scope bus.
    pub fn subscribe(&self, event: &str, handler: impl Fn(&Value) + 'static) -> Subscription {
        self.core.bus.subscribe(event, handler)
    }

    /// Publish `value` under `event`. Returns how many handlers ran.
    pub fn notify(&self, event: &str, value: &Value) -> usize {
        self.core.bus.notify(event, value)
    }

    /// Whether the scope has not been cleared.
    pub fn is_alive(&self) -> bool {
        self.core.alive.get()
    }

    /// Mark this scope as the embedded view of `entity` inside `owner`.
    /// Root-level writes are then mirrored into the owner's entity wrapper.
    pub fn set_owner(&self, owner: &Scope, entity: impl Into<String>) {
        *self.core.owner.borrow_mut() = Some(OwnerLink {
            core: Rc::downgrade(&owner.core),
            entity: entity.into(),
        });
    }

    /// Host-side change report for entity `name`.
    ///
    /// Fields whose effective value already deep-equals the incoming one are
    /// skipped. The rest are mirrored into the entity wrapper (and into any
    /// existing override) and committed as one merge. Returns `false` when
    /// nothing differed.
    pub fn on_change<K>(&self, name: &str, partial: impl IntoIterator<Item = (K, Value)>) -> bool
    where
        K: Into<String>,
    {
        let entity = self.registry().entity(name);
        let instance = entity.instance();
        let changed: Vec<(String, Value)> = partial
            .into_iter()
            .map(|(k, v)| (k.into(), v))
            .filter(|(k, v)| !entity.effective(k).is_some_and(|cur| cur.deep_eq(v)))
            .collect();
        if changed.is_empty() {
            return false;
        }
        for (k, v) in &changed {
            entity.backing().insert(k.clone(), v.clone());
            self.core.overrides.refresh(name, instance, k, v);
        }
        self.core.commit(StateUpdate::Merge {
            path: vec![REGISTRY_FIELD.to_owned(), name.to_owned()],
            fields: changed,
        });
        true
    }

    /// Ask the host to re-render without changing state.
    pub fn refresh(&self) {
        self.core.commit(StateUpdate::Refresh);
    }

    /// Run `f` with the scope root as context.
    ///
    /// Failures are logged and yield `Null` unless `fail_on_error` is set.
    pub fn eval<F, E>(&self, f: F, fail_on_error: bool) -> Result<Value, EvalError>
    where
        F: FnOnce(&ScopeProxy) -> Result<Value, E>,
        E: fmt::Display,
    {
        if !self.is_alive() {
            return Err(EvalError::Released(self.core.name.clone()));
        }
        match f(&self.proxy()) {
            Ok(value) => Ok(value),
            Err(err) if fail_on_error => Err(EvalError::Script(err.to_string())),
            Err(err) => {
                warn!(scope = %self.core.name, error = %err, "eval failed");
                Ok(Value::Null)
            }
        }
    }

    /// Drop overrides, wrappers, elements and subscriptions, and stop
    /// committing. Idempotent.
    pub fn clear(&self) {
        if !self.core.alive.replace(false) {
            return;
        }
        self.core.overrides.clear();
        self.core.arena.borrow_mut().clear();
        self.core.arrays.borrow_mut().clear();
        self.core.entities.borrow_mut().clear();
        self.core.elements.clear();
        self.core.bus.clear();
        self.core.owner.borrow_mut().take();
        debug!(scope = %self.core.name, "scope cleared");
    }

    /// Whether both handles address the same scope.
    pub fn ptr_eq(&self, other: &Scope) -> bool {
        Rc::ptr_eq(&self.core, &other.core)
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("name", &self.core.name)
            .field("alive", &self.core.alive.get())
            .field("wrappers", &self.core.arena.borrow().len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ScopeProxy
// ---------------------------------------------------------------------------

/// What a scope read produced.
#[derive(Debug, Clone)]
pub enum Read {
    /// The field is absent.
    Undefined,
    /// A primitive or an opaque handle, unwrapped.
    Value(Value),
    Array(ArrayProxy),
    Scope(ScopeProxy),
    Registry(RegistryProxy),
    Eval(EvalHook),
}

impl Read {
    /// Whether the field is absent.
    pub fn is_undefined(&self) -> bool {
        matches!(self, Read::Undefined)
    }

    /// The plain value, if this read produced one.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Read::Value(v) => Some(v),
            _ => None,
        }
    }

    /// The nested scope accessor, if the field is an object.
    pub fn into_scope(self) -> Option<ScopeProxy> {
        match self {
            Read::Scope(s) => Some(s),
            _ => None,
        }
    }

    /// The array tracker, if the field is an array.
    pub fn into_array(self) -> Option<ArrayProxy> {
        match self {
            Read::Array(a) => Some(a),
            _ => None,
        }
    }

    /// The registry accessor, if the field is the widget registry.
    pub fn into_registry(self) -> Option<RegistryProxy> {
        match self {
            Read::Registry(r) => Some(r),
            _ => None,
        }
    }

    /// The underlying value, whatever kind of wrapper was returned.
    pub fn to_value(&self) -> Value {
        match self {
            Read::Undefined | Read::Eval(_) => Value::Null,
            Read::Value(v) => v.clone(),
            Read::Array(a) => Value::Array(a.backing()),
            Read::Scope(s) => Value::Object(s.target()),
            Read::Registry(r) => Value::Object(r.raw()),
        }
    }
}

/// The reserved `eval` field of a scope.
#[derive(Clone)]
pub struct EvalHook {
    scope: Scope,
}

impl EvalHook {
    /// Run `f` in the scope's eval context.
    pub fn call<F, E>(&self, f: F, fail_on_error: bool) -> Result<Value, EvalError>
    where
        F: FnOnce(&ScopeProxy) -> Result<Value, E>,
        E: fmt::Display,
    {
        self.scope.eval(f, fail_on_error)
    }
}

impl fmt::Debug for EvalHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EvalHook({})", self.scope.name())
    }
}

/// Read/write view of one object in a scope.
///
/// A proxy keeps its object and commit path even after its cache entry is
/// evicted, so stale holders keep writing to the object they were given.
#[derive(Clone)]
pub struct ScopeProxy {
    core: Rc<ScopeCore>,
    key: WrapperKey,
    target: ObjectRef,
    path: StatePath,
}

impl ScopeProxy {
    pub(crate) fn from_parts(
        core: Rc<ScopeCore>,
        key: WrapperKey,
        target: ObjectRef,
        path: StatePath,
    ) -> Self {
        Self {
            core,
            key,
            target,
            path,
        }
    }

    /// The owning scope.
    pub fn scope(&self) -> Scope {
        Scope {
            core: self.core.clone(),
        }
    }

    /// The backing object.
    pub fn target(&self) -> ObjectRef {
        self.target.clone()
    }

    /// Path of this object below the scope root.
    pub fn path(&self) -> StatePath {
        self.path.clone()
    }

    /// Whether this accessor wraps the scope root.
    pub fn is_root(&self) -> bool {
        self.key == self.core.arena.borrow().root()
    }

    /// Whether both proxies are the same cached wrapper.
    pub fn ptr_eq(&self, other: &ScopeProxy) -> bool {
        Rc::ptr_eq(&self.core, &other.core) && self.key == other.key
    }

    /// Whether `field` exists on the wrapped object.
    pub fn contains(&self, field: &str) -> bool {
        self.target.contains_key(field)
    }

    /// Field names of the wrapped object.
    pub fn keys(&self) -> Vec<String> {
        self.target.keys()
    }

    /// Shorthand for `get(field).to_value()`.
    pub fn value(&self, field: &str) -> Value {
        self.get(field).to_value()
    }

    fn child(&self, field: &str, obj: &ObjectRef) -> ScopeProxy {
        let (key, path) = self
            .core
            .arena
            .borrow_mut()
            .child(self.key, &self.path, field, obj);
        ScopeProxy {
            core: self.core.clone(),
            key,
            target: obj.clone(),
            path,
        }
    }
}

impl Gettable for ScopeProxy {
    type Output = Read;

    fn get(&self, field: &str) -> Read {
        if field == EVAL_HOOK {
            return Read::Eval(EvalHook {
                scope: self.scope(),
            });
        }
        if field == REGISTRY_FIELD && self.is_root() {
            return Read::Registry(self.scope().registry());
        }
        match self.target().get(field) {
            None => Read::Undefined,
            Some(Value::Array(array)) => {
                let wrap = self.core.wrap_array(
                    &array,
                    ArrayTarget::Scope {
                        key: self.key,
                        object: self.target.clone(),
                        path: self.path.clone(),
                        field: field.to_owned(),
                    },
                );
                Read::Array(ArrayProxy::new(self.core.clone(), wrap))
            }
            Some(Value::Object(obj)) => Read::Scope(self.child(field, &obj)),
            Some(other) => Read::Value(other),
        }
    }
}

impl Settable for ScopeProxy {
    fn set(&self, field: &str, value: impl Into<Value>) -> bool {
        let value = value.into();
        let target = &self.target;
        let current = target.get(field);
        if current.as_ref().is_some_and(|cur| cur.same(&value)) {
            return false;
        }

        let root_level = self.is_root();
        if root_level && field == REGISTRY_FIELD {
            self.core.entities.borrow_mut().clear();
        }
        target.insert(field, value.clone());
        self.core.arena.borrow_mut().invalidate(self.key, field);
        if let Some(Value::Array(old)) = &current {
            self.core.forget_array(old.id());
        }

        let mut path = self.path.clone();
        path.push(field.to_owned());
        self.core.commit(StateUpdate::set(path, value.clone()));

        if root_level {
            self.core.mirror_to_owner(field, &value);
        }
        true
    }
}

impl fmt::Debug for ScopeProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeProxy")
            .field("scope", &self.core.name)
            .field("path", &self.path)
            .finish()
    }
}
