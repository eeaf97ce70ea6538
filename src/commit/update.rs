//! State updates and their path-minimal application to a committed root.
//!
//! Applying an update never mutates the committed tree: every object on the
//! root→target path is shallow-copied and the copies are linked back up, so
//! untouched subtrees keep their identity.

use tracing::trace;

use crate::value::{InstanceId, ObjectRef, Value};

/// Field names from the scope root down to a value.
pub type StatePath = Vec<String>;

/// Build a [`StatePath`] from string slices.
pub fn path<I, S>(segments: I) -> StatePath
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    segments.into_iter().map(Into::into).collect()
}

/// Precondition on the committed entity a guarded update targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceGuard {
    /// Path of the entity record (e.g. `["Widgets", "grid1"]`).
    pub entity: StatePath,
    /// Instance the writer believes is mounted.
    pub instance: InstanceId,
}

/// A single change scheduled against the committed snapshot.
#[derive(Debug, Clone)]
pub enum StateUpdate {
    /// Replace the value at `path`. An empty path replaces the root when the
    /// value is an object.
    Set { path: StatePath, value: Value },
    /// Merge `fields` into the object at `path`.
    Merge {
        path: StatePath,
        fields: Vec<(String, Value)>,
    },
    /// Apply `update` only while the committed entity still carries the
    /// guarded instance id.
    Guarded {
        guard: InstanceGuard,
        update: Box<StateUpdate>,
    },
    /// Delete the field at `path`.
    Remove { path: StatePath },
    /// Re-render without a structural change.
    Refresh,
}

/// Result of applying one update.
#[derive(Debug, Clone)]
pub enum Applied {
    /// The new committed root.
    Root(ObjectRef),
    /// Precondition failed; the committed root is unchanged.
    Dropped,
}

impl StateUpdate {
    /// Shorthand for [`StateUpdate::Set`].
    pub fn set(path: StatePath, value: Value) -> Self {
        StateUpdate::Set { path, value }
    }

    /// Wrap `self` in an instance guard.
    pub fn guarded(self, guard: InstanceGuard) -> Self {
        StateUpdate::Guarded {
            guard,
            update: Box::new(self),
        }
    }

    /// Apply against `root`.
    pub fn apply(&self, root: &ObjectRef) -> Applied {
        match self {
            StateUpdate::Set { path, value } => match path.split_last() {
                None => match value {
                    Value::Object(obj) => Applied::Root(obj.clone()),
                    _ => Applied::Dropped,
                },
                Some((leaf, parents)) => {
                    Applied::Root(update_along(root, parents, &|target: &ObjectRef| {
                        target.insert(leaf.clone(), value.clone());
                    }))
                }
            },
            StateUpdate::Merge { path, fields } => {
                Applied::Root(update_along(root, path, &|target: &ObjectRef| {
                    for (k, v) in fields {
                        target.insert(k.clone(), v.clone());
                    }
                }))
            }
            StateUpdate::Remove { path } => match path.split_last() {
                None => Applied::Dropped,
                Some((leaf, parents)) => {
                    Applied::Root(update_along(root, parents, &|target: &ObjectRef| {
                        target.remove(leaf);
                    }))
                }
            },
            StateUpdate::Guarded { guard, update } => {
                let committed = lookup(root, &guard.entity)
                    .and_then(|v| v.as_object().and_then(ObjectRef::instance_id));
                if committed == Some(guard.instance) {
                    update.apply(root)
                } else {
                    trace!(
                        entity = ?guard.entity,
                        writer = %guard.instance,
                        "stale instance write dropped"
                    );
                    Applied::Dropped
                }
            }
            StateUpdate::Refresh => Applied::Root(root.clone()),
        }
    }
}

/// Copy `node`, descend along `path` copying each object, then run `edit`
/// on the copy of the final object. Missing or non-object intermediates are
/// replaced by empty objects.
fn update_along(node: &ObjectRef, path: &[String], edit: &dyn Fn(&ObjectRef)) -> ObjectRef {
    let copy = node.shallow_copy();
    match path.split_first() {
        None => edit(&copy),
        Some((head, rest)) => {
            let child = match copy.get(head) {
                Some(Value::Object(obj)) => obj,
                _ => ObjectRef::new(),
            };
            copy.insert(head.clone(), Value::Object(update_along(&child, rest, edit)));
        }
    }
    copy
}

/// Resolve `path` below `root`.
pub fn lookup(root: &ObjectRef, path: &[String]) -> Option<Value> {
    let (first, rest) = path.split_first()?;
    let mut current = root.get(first)?;
    for segment in rest {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}
