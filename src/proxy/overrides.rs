//! Script-forced property values that shadow an entity's stored fields.

use std::cell::RefCell;
use std::collections::HashMap;

use indexmap::IndexMap;

use crate::value::{InstanceId, Value};

type EntityKey = (String, InstanceId);

/// Per-scope override table keyed by (entity name, instance id).
///
/// Overrides never delete the underlying stored value; they only win on read.
#[derive(Debug, Default)]
pub struct OverrideRegistry {
    entries: RefCell<HashMap<EntityKey, IndexMap<String, Value>>>,
}

impl OverrideRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a forced value.
    pub fn set(&self, entity: &str, instance: InstanceId, prop: &str, value: Value) {
        self.entries
            .borrow_mut()
            .entry((entity.to_owned(), instance))
            .or_default()
            .insert(prop.to_owned(), value);
    }

    /// The forced value of `prop`, if any.
    pub fn get(&self, entity: &str, instance: InstanceId, prop: &str) -> Option<Value> {
        self.entries
            .borrow()
            .get(&(entity.to_owned(), instance))
            .and_then(|props| props.get(prop).cloned())
    }

    /// Whether `prop` is overridden for this instance.
    pub fn contains(&self, entity: &str, instance: InstanceId, prop: &str) -> bool {
        self.entries
            .borrow()
            .get(&(entity.to_owned(), instance))
            .is_some_and(|props| props.contains_key(prop))
    }

    /// Replace `prop`'s forced value only if one exists. Returns whether it did.
    pub fn refresh(&self, entity: &str, instance: InstanceId, prop: &str, value: &Value) -> bool {
        let mut entries = self.entries.borrow_mut();
        match entries
            .get_mut(&(entity.to_owned(), instance))
            .and_then(|props| props.get_mut(prop))
        {
            Some(slot) => {
                *slot = value.clone();
                true
            }
            None => false,
        }
    }

    /// Remove one forced value.
    pub fn remove(&self, entity: &str, instance: InstanceId, prop: &str) -> Option<Value> {
        let mut entries = self.entries.borrow_mut();
        let key = (entity.to_owned(), instance);
        let props = entries.get_mut(&key)?;
        let removed = props.shift_remove(prop);
        if props.is_empty() {
            entries.remove(&key);
        }
        removed
    }

    /// Drop every override of one entity instance.
    pub fn clear_entity(&self, entity: &str, instance: InstanceId) {
        self.entries
            .borrow_mut()
            .remove(&(entity.to_owned(), instance));
    }

    /// Names of overridden properties for one entity instance.
    pub fn props(&self, entity: &str, instance: InstanceId) -> Vec<String> {
        self.entries
            .borrow()
            .get(&(entity.to_owned(), instance))
            .map(|props| props.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Total number of forced values.
    pub fn len(&self) -> usize {
        self.entries.borrow().values().map(IndexMap::len).sum()
    }

    /// Whether no overrides are recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every override.
    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get_per_instance() {
        let overrides = OverrideRegistry::new();
        let a = InstanceId::fresh();
        let b = InstanceId::fresh();
        overrides.set("grid", a, "visible", Value::from(false));

        assert_eq!(overrides.get("grid", a, "visible").unwrap().as_bool(), Some(false));
        assert!(overrides.get("grid", b, "visible").is_none());
        assert!(overrides.get("other", a, "visible").is_none());
        assert_eq!(overrides.len(), 1);
    }

    #[test]
    fn refresh_only_touches_existing() {
        let overrides = OverrideRegistry::new();
        let id = InstanceId::fresh();
        assert!(!overrides.refresh("w", id, "value", &Value::from(1)));
        overrides.set("w", id, "value", Value::from(0));
        assert!(overrides.refresh("w", id, "value", &Value::from(1)));
        assert_eq!(overrides.get("w", id, "value").unwrap().as_i64(), Some(1));
    }

    #[test]
    fn remove_and_clear() {
        let overrides = OverrideRegistry::new();
        let id = InstanceId::fresh();
        overrides.set("w", id, "a", Value::from(1));
        overrides.set("w", id, "b", Value::from(2));
        assert_eq!(overrides.props("w", id), vec!["a", "b"]);

        assert_eq!(overrides.remove("w", id, "a").unwrap().as_i64(), Some(1));
        assert!(!overrides.contains("w", id, "a"));

        overrides.clear_entity("w", id);
        assert!(overrides.is_empty());

        overrides.set("x", id, "a", Value::Null);
        overrides.clear();
        assert!(overrides.is_empty());
    }
}
