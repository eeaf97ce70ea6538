//! Arena of scope wrappers: one node per wrapped backing object.
//!
//! All nodes live in a single `SlotMap`. Per-node child caches map a field
//! name to the wrapper built for that field's object, and an identity index
//! maps every wrapped object to its node so the same object is never wrapped
//! twice (shared and self-referential data resolve to the existing node).

use std::collections::{HashMap, HashSet, VecDeque};

use slotmap::{new_key_type, SecondaryMap, SlotMap};

use crate::commit::StatePath;
use crate::value::{ObjId, ObjectRef};

new_key_type! {
    /// Stable key of one scope wrapper node.
    pub struct WrapperKey;
}

/// One wrapped object and where it sits below the scope root.
#[derive(Debug, Clone)]
pub struct WrapperNode {
    /// The backing object reads and writes go to.
    pub target: ObjectRef,
    /// Path from the scope root, used for commits.
    pub path: StatePath,
    /// Parent node and field this node was first built for.
    pub parent: Option<(WrapperKey, String)>,
}

/// The wrapper arena of one scope.
#[derive(Debug)]
pub struct WrapperArena {
    nodes: SlotMap<WrapperKey, WrapperNode>,
    children: SecondaryMap<WrapperKey, HashMap<String, WrapperKey>>,
    wrapped: HashMap<ObjId, WrapperKey>,
    root: WrapperKey,
}

impl WrapperArena {
    /// Create an arena whose root node wraps `root`.
    pub fn new(root: ObjectRef) -> Self {
        let mut nodes = SlotMap::with_key();
        let mut wrapped = HashMap::new();
        let key = nodes.insert(WrapperNode {
            target: root.clone(),
            path: Vec::new(),
            parent: None,
        });
        wrapped.insert(root.id(), key);
        let mut children = SecondaryMap::new();
        children.insert(key, HashMap::new());
        Self {
            nodes,
            children,
            wrapped,
            root: key,
        }
    }

    /// Key of the root wrapper.
    pub fn root(&self) -> WrapperKey {
        self.root
    }

    /// Look up a wrapper node.
    pub fn get(&self, key: WrapperKey) -> Option<&WrapperNode> {
        self.nodes.get(key)
    }

    /// Number of cached wrappers.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no wrappers are cached.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether `obj` already has a wrapper node.
    pub fn is_wrapped(&self, obj: &ObjectRef) -> bool {
        self.wrapped.contains_key(&obj.id())
    }

    /// The wrapper for `obj` stored under `parent.field`, building and caching
    /// one if the cache is empty or holds a different object. Returns the
    /// node key and the node's commit path.
    ///
    /// A parent that has been evicted still gets a node for the child; it is
    /// just not cached under the parent.
    pub fn child(
        &mut self,
        parent: WrapperKey,
        parent_path: &[String],
        field: &str,
        obj: &ObjectRef,
    ) -> (WrapperKey, StatePath) {
        let cached = self
            .children
            .get(parent)
            .and_then(|kids| kids.get(field))
            .copied()
            .and_then(|k| {
                self.nodes
                    .get(k)
                    .filter(|n| n.target.ptr_eq(obj))
                    .map(|n| (k, n.path.clone()))
            });
        if let Some(hit) = cached {
            return hit;
        }

        let existing = self
            .wrapped
            .get(&obj.id())
            .and_then(|k| self.nodes.get(*k).map(|n| (*k, n.path.clone())));
        let (key, path) = match existing {
            Some(hit) => hit,
            None => {
                let mut path = parent_path.to_vec();
                path.push(field.to_owned());
                let key = self.nodes.insert(WrapperNode {
                    target: obj.clone(),
                    path: path.clone(),
                    parent: Some((parent, field.to_owned())),
                });
                self.children.insert(key, HashMap::new());
                self.wrapped.insert(obj.id(), key);
                (key, path)
            }
        };
        if let Some(kids) = self.children.get_mut(parent) {
            kids.insert(field.to_owned(), key);
        }
        (key, path)
    }

    /// Drop the cached child of `parent.field`. If that child was built for
    /// this field, its whole subtree is evicted as well.
    pub fn invalidate(&mut self, parent: WrapperKey, field: &str) {
        let Some(child) = self
            .children
            .get_mut(parent)
            .and_then(|kids| kids.remove(field))
        else {
            return;
        };
        let owned_here = self
            .nodes
            .get(child)
            .and_then(|n| n.parent.as_ref())
            .is_some_and(|(p, f)| *p == parent && f == field);
        if owned_here {
            self.remove_subtree(child);
        }
    }

    fn remove_subtree(&mut self, start: WrapperKey) {
        let mut queue = VecDeque::from([start]);
        let mut seen = HashSet::new();
        while let Some(current) = queue.pop_front() {
            if current == self.root || !seen.insert(current) {
                continue;
            }
            if let Some(kids) = self.children.remove(current) {
                queue.extend(kids.into_values());
            }
            if let Some(node) = self.nodes.remove(current) {
                if self.wrapped.get(&node.target.id()) == Some(&current) {
                    self.wrapped.remove(&node.target.id());
                }
            }
        }
    }

    /// Evict every node except the root.
    pub fn clear(&mut self) {
        let root = self.root;
        self.nodes.retain(|k, _| k == root);
        self.children.retain(|k, _| k == root);
        if let Some(kids) = self.children.get_mut(root) {
            kids.clear();
        }
        self.wrapped.retain(|_, k| *k == root);
    }
}
