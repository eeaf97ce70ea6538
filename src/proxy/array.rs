//! Array mutation tracking.
//!
//! An [`ArrayProxy`] wraps a sequence stored in a scope field or an entity
//! property. Reads pass straight through. Every mutating operation runs
//! against the backing array first and then commits a shallow copy into the
//! owning field, so the rendering side sees a new array reference. The
//! tracker follows the copy and stays the same object for its holders.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use super::arena::WrapperKey;
use super::entity::{EntityProxy, EntityWrap};
use super::scope::{ScopeCore, ScopeProxy};
use super::Settable;
use crate::commit::StatePath;
use crate::value::{ArrayRef, ObjectRef, Value};

/// How far past the end an index assignment may pad.
pub const MAX_INDEX_GAP: usize = 1 << 16;

/// Where a tracked array lives.
pub(crate) enum ArrayTarget {
    /// A field of a scope object.
    Scope {
        key: WrapperKey,
        object: ObjectRef,
        path: StatePath,
        field: String,
    },
    /// A property of a registry entity.
    Entity {
        entity: Rc<EntityWrap>,
        field: String,
    },
}

pub(crate) struct ArrayWrap {
    backing: RefCell<ArrayRef>,
    target: ArrayTarget,
}

impl ArrayWrap {
    pub(crate) fn new(backing: ArrayRef, target: ArrayTarget) -> Self {
        Self {
            backing: RefCell::new(backing),
            target,
        }
    }
}

/// Mutation-tracking view of a stored sequence.
#[derive(Clone)]
pub struct ArrayProxy {
    core: Rc<ScopeCore>,
    wrap: Rc<ArrayWrap>,
}

impl ArrayProxy {
    pub(crate) fn new(core: Rc<ScopeCore>, wrap: Rc<ArrayWrap>) -> Self {
        Self { core, wrap }
    }

    /// The array operations currently apply to.
    pub fn backing(&self) -> ArrayRef {
        self.wrap.backing.borrow().clone()
    }

    /// Whether both proxies are the same tracker.
    pub fn ptr_eq(&self, other: &ArrayProxy) -> bool {
        Rc::ptr_eq(&self.wrap, &other.wrap)
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.backing().len()
    }

    /// Whether the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.backing().is_empty()
    }

    /// Element at `index`, if present.
    pub fn get(&self, index: usize) -> Option<Value> {
        self.backing().get(index)
    }

    /// Copy of the current elements.
    pub fn to_vec(&self) -> Vec<Value> {
        self.backing().to_vec()
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Append; returns the new length.
    pub fn push(&self, value: impl Into<Value>) -> usize {
        let value = value.into();
        self.mutate(|items| {
            items.push(value);
            items.len()
        })
    }

    /// Remove from the back.
    pub fn pop(&self) -> Option<Value> {
        self.mutate(Vec::pop)
    }

    /// Remove from the front.
    pub fn shift(&self) -> Option<Value> {
        self.mutate(|items| (!items.is_empty()).then(|| items.remove(0)))
    }

    /// Insert at the front; returns the new length.
    pub fn unshift(&self, value: impl Into<Value>) -> usize {
        let value = value.into();
        self.mutate(|items| {
            items.insert(0, value);
            items.len()
        })
    }

    /// Replace `delete` elements from `start` with `insert`. Out-of-range
    /// bounds are clamped. Returns the removed elements.
    pub fn splice(&self, start: usize, delete: usize, insert: Vec<Value>) -> Vec<Value> {
        self.mutate(|items| {
            let start = start.min(items.len());
            let end = start.saturating_add(delete).min(items.len());
            items.splice(start..end, insert).collect()
        })
    }

    /// Sort in place with `compare`.
    pub fn sort_by(&self, compare: impl FnMut(&Value, &Value) -> Ordering) {
        self.mutate(|items| items.sort_by(compare));
    }

    /// Reverse in place.
    pub fn reverse(&self) {
        self.mutate(|items| items.reverse());
    }

    /// Overwrite every element with `value`.
    pub fn fill(&self, value: impl Into<Value>) {
        let value = value.into();
        self.mutate(|items| items.fill(value));
    }

    /// Rotate left by `mid` (wrapping).
    pub fn rotate_left(&self, mid: usize) {
        self.mutate(|items| {
            if !items.is_empty() {
                let mid = mid % items.len();
                items.rotate_left(mid);
            }
        });
    }

    /// Index assignment. Writing past the end pads with `Null`, up to
    /// [`MAX_INDEX_GAP`] slots; farther writes are dropped without a commit.
    /// Returns the previous element (`Null` for padded slots).
    pub fn set(&self, index: usize, value: impl Into<Value>) -> Value {
        let len = self.len();
        if index.saturating_sub(len) > MAX_INDEX_GAP {
            debug!(index, len, "index assignment out of range");
            return Value::Null;
        }
        let value = value.into();
        self.mutate(|items| {
            if index >= items.len() {
                items.resize(index + 1, Value::Null);
            }
            std::mem::replace(&mut items[index], value)
        })
    }

    fn mutate<R>(&self, op: impl FnOnce(&mut Vec<Value>) -> R) -> R {
        let backing = self.backing();
        let result = backing.with_mut(op);
        let fresh = backing.shallow_copy();
        self.recommit(&backing, fresh);
        result
    }

    fn recommit(&self, old: &ArrayRef, fresh: ArrayRef) {
        let value = Value::Array(fresh.clone());
        match &self.wrap.target {
            ArrayTarget::Scope {
                key,
                object,
                path,
                field,
            } => {
                let owner =
                    ScopeProxy::from_parts(self.core.clone(), *key, object.clone(), path.clone());
                owner.set(field, value);
            }
            ArrayTarget::Entity { entity, field } => {
                EntityProxy::new(self.core.clone(), entity.clone()).set(field, value);
            }
        }
        *self.wrap.backing.borrow_mut() = fresh.clone();
        let mut arrays = self.core.arrays.borrow_mut();
        arrays.remove(&old.id());
        arrays.insert(fresh.id(), self.wrap.clone());
    }
}

impl fmt::Debug for ArrayProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ArrayProxy").field(&self.backing()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::StateStore;
    use crate::proxy::{Gettable, Scope};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn tracked(json: serde_json::Value) -> (Scope, Rc<StateStore>, ArrayProxy) {
        let root = Value::from(json).as_object().cloned().unwrap_or_default();
        let store = Rc::new(StateStore::new(root.clone()));
        let scope = Scope::new("page", root, store.clone());
        let list = scope.proxy().get("list").into_array().unwrap();
        (scope, store, list)
    }

    fn field(scope: &Scope) -> ArrayRef {
        scope.backing().get("list").unwrap().as_array().unwrap().clone()
    }

    #[test]
    fn push_mutates_in_place_and_commits_new_reference() {
        let (scope, store, list) = tracked(json!({"list": [1, 2, 3]}));
        let original = field(&scope);

        assert_eq!(list.push(4), 4);

        assert_eq!(original.len(), 4);
        let current = field(&scope);
        assert!(!current.ptr_eq(&original));
        assert!(Value::Array(current).deep_eq(&Value::Array(original)));
        assert_eq!(store.scheduled_count(), 1);
        store.flush();
        assert_eq!(store.lookup(&["list"]).unwrap().to_json(), json!([1, 2, 3, 4]));
    }

    #[test]
    fn reads_have_no_side_effects() {
        let (_, store, list) = tracked(json!({"list": ["a", "b"]}));
        assert_eq!(list.len(), 2);
        assert_eq!(list.get(1).unwrap().as_str(), Some("b"));
        assert_eq!(list.to_vec().len(), 2);
        assert!(!list.is_empty());
        assert_eq!(store.scheduled_count(), 0);
    }

    #[test]
    fn tracker_is_identity_stable() {
        let (scope, _, list) = tracked(json!({"list": []}));
        let again = scope.proxy().get("list").into_array().unwrap();
        assert!(again.ptr_eq(&list));
        list.push(1);
        let after = scope.proxy().get("list").into_array().unwrap();
        assert!(after.ptr_eq(&list));
    }

    #[test]
    fn operations_return_original_results() {
        let (scope, store, list) = tracked(json!({"list": [3, 1, 2]}));
        assert_eq!(list.pop().and_then(|v| v.as_i64()), Some(2));
        assert_eq!(list.shift().and_then(|v| v.as_i64()), Some(3));
        assert_eq!(list.unshift(0), 2);
        let removed = list.splice(1, 1, vec![Value::from(7), Value::from(8)]);
        assert_eq!(removed.len(), 1);
        list.sort_by(|a, b| {
            a.as_f64()
                .partial_cmp(&b.as_f64())
                .unwrap_or(Ordering::Equal)
        });
        list.reverse();
        list.rotate_left(1);
        assert_eq!(Value::Array(field(&scope)).to_json(), json!([7, 0, 8]));
        assert_eq!(store.scheduled_count(), 7);
    }

    #[test]
    fn index_assignment_pads_and_commits() {
        let (scope, store, list) = tracked(json!({"list": ["a"]}));
        assert!(list.set(2, "c").is_null());
        assert_eq!(
            Value::Array(field(&scope)).to_json(),
            json!(["a", null, "c"])
        );
        assert_eq!(list.set(0, "z").as_str(), Some("a"));
        assert_eq!(store.scheduled_count(), 2);
    }

    #[test]
    fn far_index_assignment_is_dropped() {
        let (scope, store, list) = tracked(json!({"list": [1]}));
        assert!(list.set(usize::MAX, 2).is_null());
        assert!(list.set(1 + MAX_INDEX_GAP + 1, 2).is_null());
        assert_eq!(Value::Array(field(&scope)).to_json(), json!([1]));
        assert_eq!(store.scheduled_count(), 0);

        list.set(1 + MAX_INDEX_GAP, 2);
        assert_eq!(list.len(), MAX_INDEX_GAP + 2);
        assert_eq!(store.scheduled_count(), 1);
    }

    #[test]
    fn fill_and_empty_edge_cases() {
        let (scope, _, list) = tracked(json!({"list": [1, 2]}));
        list.fill(0);
        assert_eq!(Value::Array(field(&scope)).to_json(), json!([0, 0]));
        let (_, _, empty) = tracked(json!({"list": []}));
        assert!(empty.pop().is_none());
        assert!(empty.shift().is_none());
        empty.rotate_left(3);
        assert!(empty.splice(5, 2, Vec::new()).is_empty());
    }

    #[test]
    fn nested_array_commits_under_its_path() {
        let root = Value::from(json!({"form": {"tags": ["x"]}}))
            .as_object()
            .cloned()
            .unwrap();
        let store = Rc::new(StateStore::new(root.clone()));
        let scope = Scope::new("page", root, store.clone());
        let tags = scope
            .proxy()
            .get("form")
            .into_scope()
            .and_then(|f| f.get("tags").into_array())
            .unwrap();
        tags.push("y");
        store.flush();
        assert_eq!(store.lookup(&["form", "tags"]).unwrap().to_json(), json!(["x", "y"]));
    }
}
