//! Dynamic state values: primitives, shared objects and arrays, opaque handles.
//!
//! Objects and arrays are reference types. Two values are [`Value::same`] when
//! they are equal primitives or point at the same allocation; that identity is
//! what the commit path and the wrapper caches key on.
//!
//! Every [`ObjectRef`] and [`ArrayRef`] receives an [`ObjId`] at creation.
//! Entity objects additionally carry an implicit [`InstanceId`] tag that is not
//! visible as a field but travels with shallow copies.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use serde::{Serialize, Serializer};

use crate::variable::Variable;

/// Maximum nesting followed when converting to JSON.
const MAX_JSON_DEPTH: usize = 64;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

// ---------------------------------------------------------------------------
// Identity tokens
// ---------------------------------------------------------------------------

/// Identity of a shared object or array allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjId(u64);

/// Identity of one live mount of an entity.
///
/// Two entities registered under the same name but mounted at different times
/// carry different instance ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    /// Allocate a new, never-before-used instance id.
    pub fn fresh() -> Self {
        Self(next_id())
    }

    /// Raw numeric form, for logging.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ObjectRef
// ---------------------------------------------------------------------------

struct ObjectCell {
    id: ObjId,
    instance: Cell<Option<InstanceId>>,
    fields: RefCell<IndexMap<String, Value>>,
}

/// Shared, mutable, insertion-ordered record.
#[derive(Clone)]
pub struct ObjectRef(Rc<ObjectCell>);

impl ObjectRef {
    /// Create an empty object.
    pub fn new() -> Self {
        Self::with_fields(IndexMap::new())
    }

    fn with_fields(fields: IndexMap<String, Value>) -> Self {
        Self(Rc::new(ObjectCell {
            id: ObjId(next_id()),
            instance: Cell::new(None),
            fields: RefCell::new(fields),
        }))
    }

    /// Create an object from key/value pairs.
    pub fn from_pairs<K, I>(pairs: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::with_fields(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Create a minimal entity record `{ name }` with a fresh instance id.
    pub fn entity(name: &str) -> Self {
        let obj = Self::from_pairs([("name", Value::from(name))]);
        obj.set_instance_id(Some(InstanceId::fresh()));
        obj
    }

    /// Identity token of this allocation.
    pub fn id(&self) -> ObjId {
        self.0.id
    }

    /// The implicit instance tag, if this object represents an entity.
    pub fn instance_id(&self) -> Option<InstanceId> {
        self.0.instance.get()
    }

    /// Replace the implicit instance tag.
    pub fn set_instance_id(&self, instance: Option<InstanceId>) {
        self.0.instance.set(instance);
    }

    /// Clone the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.fields.borrow().get(key).cloned()
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.fields.borrow().contains_key(key)
    }

    /// Store `value` under `key`, returning the previous value.
    pub fn insert(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.fields.borrow_mut().insert(key.into(), value)
    }

    /// Remove `key`, preserving the order of the remaining fields.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.0.fields.borrow_mut().shift_remove(key)
    }

    /// Field names in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.0.fields.borrow().keys().cloned().collect()
    }

    /// Cloned `(key, value)` pairs in insertion order.
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.0
            .fields
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.0.fields.borrow().len()
    }

    /// Whether the object has no fields.
    pub fn is_empty(&self) -> bool {
        self.0.fields.borrow().is_empty()
    }

    /// New allocation with the same fields (values shared, not copied) and
    /// the same instance tag.
    pub fn shallow_copy(&self) -> ObjectRef {
        let copy = Self::with_fields(self.0.fields.borrow().clone());
        copy.set_instance_id(self.instance_id());
        copy
    }

    /// Copy every field of `other` into `self`, plus its instance tag when it
    /// has one. Fields absent from `other` are kept.
    pub fn assign_from(&self, other: &ObjectRef) {
        if self.ptr_eq(other) {
            return;
        }
        let incoming = other.entries();
        let mut fields = self.0.fields.borrow_mut();
        for (k, v) in incoming {
            fields.insert(k, v);
        }
        drop(fields);
        if let Some(instance) = other.instance_id() {
            self.set_instance_id(Some(instance));
        }
    }

    /// Whether both handles point at the same allocation.
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for ObjectRef {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        match self.0.fields.try_borrow() {
            Ok(fields) => {
                for (k, v) in fields.iter() {
                    map.entry(k, &ShallowDebug(v));
                }
            }
            Err(_) => {
                map.entry(&"<borrowed>", &self.0.id);
            }
        }
        map.finish()
    }
}

// ---------------------------------------------------------------------------
// ArrayRef
// ---------------------------------------------------------------------------

struct ArrayCell {
    id: ObjId,
    items: RefCell<Vec<Value>>,
}

/// Shared, mutable sequence.
#[derive(Clone)]
pub struct ArrayRef(Rc<ArrayCell>);

impl ArrayRef {
    /// Create an array holding `items`.
    pub fn new(items: Vec<Value>) -> Self {
        Self(Rc::new(ArrayCell {
            id: ObjId(next_id()),
            items: RefCell::new(items),
        }))
    }

    /// Identity token of this allocation.
    pub fn id(&self) -> ObjId {
        self.0.id
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.0.items.borrow().len()
    }

    /// Whether the array is empty.
    pub fn is_empty(&self) -> bool {
        self.0.items.borrow().is_empty()
    }

    /// Clone the element at `index`.
    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.items.borrow().get(index).cloned()
    }

    /// Clone all elements.
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.items.borrow().clone()
    }

    /// Run `f` against the elements in place.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut Vec<Value>) -> R) -> R {
        f(&mut self.0.items.borrow_mut())
    }

    /// New allocation with the same elements.
    pub fn shallow_copy(&self) -> ArrayRef {
        Self::new(self.to_vec())
    }

    /// Whether both handles point at the same allocation.
    pub fn ptr_eq(&self, other: &ArrayRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for ArrayRef {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl fmt::Debug for ArrayRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        if let Ok(items) = self.0.items.try_borrow() {
            for v in items.iter() {
                list.entry(&ShallowDebug(v));
            }
        }
        list.finish()
    }
}

/// Debug helper that prints nested references by id to stay finite on cycles.
struct ShallowDebug<'a>(&'a Value);

impl fmt::Debug for ShallowDebug<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Value::Object(o) => write!(f, "Object({})", o.id().0),
            Value::Array(a) => write!(f, "Array({}; len {})", a.id().0, a.len()),
            other => fmt::Debug::fmt(other, f),
        }
    }
}

// ---------------------------------------------------------------------------
// Opaque handles
// ---------------------------------------------------------------------------

/// Host-provided reference to a rendered element. Never wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DomHandle(u64);

impl DomHandle {
    /// Wrap a host element id.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The host element id.
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// A callable stored in state (widget methods, lifecycle hooks).
#[derive(Clone)]
pub struct Callable(Rc<dyn Fn(&[Value]) -> Value>);

impl Callable {
    /// Wrap a closure.
    pub fn new(f: impl Fn(&[Value]) -> Value + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Invoke with `args`.
    pub fn call(&self, args: &[Value]) -> Value {
        (self.0)(args)
    }

    /// Whether both handles wrap the same closure allocation.
    pub fn ptr_eq(&self, other: &Callable) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callable")
    }
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A dynamically typed state value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Array(ArrayRef),
    Object(ObjectRef),
    Dom(DomHandle),
    Variable(Rc<Variable>),
    Function(Callable),
}

impl Value {
    /// Convenience constructor for an empty object.
    pub fn object() -> Self {
        Value::Object(ObjectRef::new())
    }

    /// Convenience constructor for an array.
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(ArrayRef::new(items))
    }

    /// Strict identity: equal primitives, or the same allocation.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Dom(a), Value::Dom(b)) => a == b,
            (Value::Variable(a), Value::Variable(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Structural equality. Cycles compare equal once revisited.
    pub fn deep_eq(&self, other: &Value) -> bool {
        let mut seen = HashSet::new();
        deep_eq_inner(self, other, &mut seen)
    }

    /// Recursive copy of objects and arrays. Shared and cyclic references are
    /// preserved in the copy; opaque handles are shared.
    pub fn deep_clone(&self) -> Value {
        let mut copies = HashMap::new();
        deep_clone_inner(self, &mut copies)
    }

    /// Whether this is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether this value is a plain object (and therefore wrapped on read).
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Integral numbers only.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) if n.fract() == 0.0 => Some(*n as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_variable(&self) -> Option<&Rc<Variable>> {
        match self {
            Value::Variable(v) => Some(v),
            _ => None,
        }
    }

    /// Convert to JSON. Opaque handles become `null`; cycles are cut.
    pub fn to_json(&self) -> serde_json::Value {
        let mut path = HashSet::new();
        to_json_inner(self, &mut path, 0)
    }
}

fn deep_eq_inner(a: &Value, b: &Value, seen: &mut HashSet<(ObjId, ObjId)>) -> bool {
    match (a, b) {
        (Value::Object(x), Value::Object(y)) => {
            if x.ptr_eq(y) || !seen.insert((x.id(), y.id())) {
                return true;
            }
            let left = x.entries();
            left.len() == y.len()
                && left.iter().all(|(k, v)| {
                    y.get(k)
                        .is_some_and(|other| deep_eq_inner(v, &other, seen))
                })
        }
        (Value::Array(x), Value::Array(y)) => {
            if x.ptr_eq(y) || !seen.insert((x.id(), y.id())) {
                return true;
            }
            let (left, right) = (x.to_vec(), y.to_vec());
            left.len() == right.len()
                && left
                    .iter()
                    .zip(right.iter())
                    .all(|(l, r)| deep_eq_inner(l, r, seen))
        }
        _ => a.same(b),
    }
}

fn deep_clone_inner(value: &Value, copies: &mut HashMap<ObjId, Value>) -> Value {
    match value {
        Value::Object(obj) => {
            if let Some(copy) = copies.get(&obj.id()) {
                return copy.clone();
            }
            let copy = ObjectRef::new();
            copy.set_instance_id(obj.instance_id());
            copies.insert(obj.id(), Value::Object(copy.clone()));
            for (k, v) in obj.entries() {
                let child = deep_clone_inner(&v, copies);
                copy.insert(k, child);
            }
            Value::Object(copy)
        }
        Value::Array(arr) => {
            if let Some(copy) = copies.get(&arr.id()) {
                return copy.clone();
            }
            let copy = ArrayRef::default();
            copies.insert(arr.id(), Value::Array(copy.clone()));
            let items: Vec<Value> = arr
                .to_vec()
                .iter()
                .map(|v| deep_clone_inner(v, copies))
                .collect();
            copy.with_mut(|slot| *slot = items);
            Value::Array(copy)
        }
        other => other.clone(),
    }
}

fn to_json_inner(value: &Value, path: &mut HashSet<ObjId>, depth: usize) -> serde_json::Value {
    if depth > MAX_JSON_DEPTH {
        return serde_json::Value::Null;
    }
    match value {
        Value::Null | Value::Dom(_) | Value::Variable(_) | Value::Function(_) => {
            serde_json::Value::Null
        }
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => {
            serde_json::Value::Number(serde_json::Number::from(*n as i64))
        }
        Value::Number(n) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s.to_string()),
        Value::Array(arr) => {
            if !path.insert(arr.id()) {
                return serde_json::Value::Null;
            }
            let out = arr
                .to_vec()
                .iter()
                .map(|v| to_json_inner(v, path, depth + 1))
                .collect();
            path.remove(&arr.id());
            serde_json::Value::Array(out)
        }
        Value::Object(obj) => {
            if !path.insert(obj.id()) {
                return serde_json::Value::Null;
            }
            let out = obj
                .entries()
                .into_iter()
                .map(|(k, v)| {
                    let json = to_json_inner(&v, path, depth + 1);
                    (k, json)
                })
                .collect();
            path.remove(&obj.id());
            serde_json::Value::Object(out)
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Array(a) => fmt::Debug::fmt(a, f),
            Value::Object(o) => fmt::Debug::fmt(o, f),
            Value::Dom(d) => write!(f, "Dom({})", d.raw()),
            Value::Variable(v) => write!(f, "Variable({})", v.name()),
            Value::Function(_) => f.write_str("Function"),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Number(f64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Number(v as f64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Number(f64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(Rc::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(Rc::from(v))
    }
}

impl From<ObjectRef> for Value {
    fn from(v: ObjectRef) -> Self {
        Value::Object(v)
    }
}

impl From<ArrayRef> for Value {
    fn from(v: ArrayRef) -> Self {
        Value::Array(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::array(v)
    }
}

impl From<DomHandle> for Value {
    fn from(v: DomHandle) -> Self {
        Value::Dom(v)
    }
}

impl From<Rc<Variable>> for Value {
    fn from(v: Rc<Variable>) -> Self {
        Value::Variable(v)
    }
}

impl From<Callable> for Value {
    fn from(v: Callable) -> Self {
        Value::Function(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().map(Value::Number).unwrap_or_default(),
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => {
                Value::array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Object(ObjectRef::from_pairs(
                map.into_iter().map(|(k, v)| (k, Value::from(v))),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn same_compares_primitives_by_value() {
        assert!(Value::from(3).same(&Value::from(3.0)));
        assert!(Value::from("a").same(&Value::from("a")));
        assert!(!Value::from(1).same(&Value::from("1")));
        assert!(Value::Null.same(&Value::Null));
    }

    #[test]
    fn same_compares_objects_by_identity() {
        let a = ObjectRef::new();
        let b = ObjectRef::new();
        assert!(Value::Object(a.clone()).same(&Value::Object(a.clone())));
        assert!(!Value::Object(a).same(&Value::Object(b)));
    }

    #[test]
    fn deep_eq_ignores_identity() {
        let a = Value::from(json!({"x": [1, 2, {"y": "z"}]}));
        let b = Value::from(json!({"x": [1, 2, {"y": "z"}]}));
        assert!(!a.same(&b));
        assert!(a.deep_eq(&b));
        let c = Value::from(json!({"x": [1, 2, {"y": "w"}]}));
        assert!(!a.deep_eq(&c));
    }

    #[test]
    fn deep_eq_terminates_on_cycles() {
        let a = ObjectRef::new();
        a.insert("me", Value::Object(a.clone()));
        let b = ObjectRef::new();
        b.insert("me", Value::Object(b.clone()));
        assert!(Value::Object(a).deep_eq(&Value::Object(b)));
    }

    #[test]
    fn deep_clone_breaks_aliasing_and_keeps_cycles() {
        let inner = ObjectRef::from_pairs([("n", Value::from(1))]);
        let outer = ObjectRef::from_pairs([("inner", Value::Object(inner.clone()))]);
        outer.insert("self", Value::Object(outer.clone()));

        let copy = Value::Object(outer.clone()).deep_clone();
        inner.insert("n", Value::from(2));

        let copy = copy.as_object().unwrap().clone();
        let copied_inner = copy.get("inner").unwrap();
        assert_eq!(copied_inner.as_object().unwrap().get("n").unwrap().as_i64(), Some(1));
        assert!(copy.get("self").unwrap().same(&Value::Object(copy.clone())));
    }

    #[test]
    fn shallow_copy_shares_children_and_instance() {
        let child = ObjectRef::new();
        let entity = ObjectRef::entity("button1");
        entity.insert("child", Value::Object(child.clone()));

        let copy = entity.shallow_copy();
        assert!(!copy.ptr_eq(&entity));
        assert_ne!(copy.id(), entity.id());
        assert_eq!(copy.instance_id(), entity.instance_id());
        assert!(copy.get("child").unwrap().same(&Value::Object(child)));
    }

    #[test]
    fn assign_from_copies_fields_and_instance() {
        let target = ObjectRef::from_pairs([("keep", Value::from(true))]);
        let source = ObjectRef::entity("x");
        source.insert("value", Value::from(4));
        target.assign_from(&source);
        assert_eq!(target.get("value").unwrap().as_i64(), Some(4));
        assert_eq!(target.get("keep").unwrap().as_bool(), Some(true));
        assert_eq!(target.instance_id(), source.instance_id());
        // self-assign is a no-op rather than a double borrow
        target.assign_from(&target.clone());
    }

    #[test]
    fn entity_ids_are_unique() {
        let a = ObjectRef::entity("w");
        let b = ObjectRef::entity("w");
        assert_ne!(a.instance_id(), b.instance_id());
        assert_eq!(a.get("name").unwrap().as_str(), Some("w"));
    }

    #[test]
    fn json_round_trip_keeps_shape() {
        let original = json!({"a": 1, "b": [true, null, "s"], "c": {"d": 2.5}});
        let value = Value::from(original.clone());
        assert_eq!(value.to_json(), original);
    }

    #[test]
    fn to_json_cuts_cycles_and_opaque_handles() {
        let obj = ObjectRef::new();
        obj.insert("me", Value::Object(obj.clone()));
        obj.insert("el", Value::Dom(DomHandle::new(9)));
        assert_eq!(Value::Object(obj).to_json(), json!({"me": null, "el": null}));
    }

    #[test]
    fn as_i64_rejects_fractions() {
        assert_eq!(Value::from(2.0).as_i64(), Some(2));
        assert_eq!(Value::from(2.5).as_i64(), None);
    }

    #[test]
    fn remove_preserves_order() {
        let obj = ObjectRef::from_pairs([
            ("a", Value::from(1)),
            ("b", Value::from(2)),
            ("c", Value::from(3)),
        ]);
        obj.remove("b");
        assert_eq!(obj.keys(), vec!["a", "c"]);
    }
}
