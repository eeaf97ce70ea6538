//! The state-interception layer.
//!
//! Reads and writes on scope state go through typed accessor objects instead
//! of touching the backing tree directly:
//!
//! - [`ScopeProxy`]: one object of a scope tree (the root, or any nested
//!   plain object reached from it)
//! - [`RegistryProxy`]: the `Widgets` registry of a scope
//! - [`EntityProxy`]: one named entity in that registry
//! - [`ArrayProxy`]: a sequence field, with mutation tracking
//!
//! Every write mutates the backing object first, so later synchronous reads
//! see it, and then schedules a path-minimal commit on the scope's
//! [`CommitSink`](crate::commit::CommitSink).

pub mod arena;
pub mod array;
pub mod element;
pub mod entity;
pub mod overrides;
pub mod registry;
pub mod scope;

pub use arena::{WrapperArena, WrapperKey, WrapperNode};
pub use array::ArrayProxy;
pub use element::{ElementRef, ElementRegistry};
pub use entity::{EntityProxy, EntityRead, PropertySetter};
pub use overrides::OverrideRegistry;
pub use registry::RegistryProxy;
pub use scope::{EvalError, EvalHook, Read, Scope, ScopeProxy};

use crate::value::Value;

/// Root field holding the entity registry.
pub const REGISTRY_FIELD: &str = "Widgets";
/// Root field holding the scope's variables.
pub const VARIABLES_FIELD: &str = "Variables";
/// Root field holding the scope's actions.
pub const ACTIONS_FIELD: &str = "Actions";
/// Root flag set while startup work is outstanding.
pub const LOADING_FIELD: &str = "loading";
/// Reserved field returning the scope's evaluation hook.
pub const EVAL_HOOK: &str = "eval";
/// Reserved entity property returning a fluent setter.
pub const SET_PROPERTY: &str = "setProperty";
/// Reserved entity property returning the rendered element.
pub const DOM_HANDLE: &str = "nativeElement";

/// Whether `prop` is runtime bookkeeping that scripts never write.
pub fn is_internal(prop: &str) -> bool {
    prop.is_empty() || prop.starts_with('$') || prop.starts_with("__")
}

/// Read capability of an accessor object.
pub trait Gettable {
    type Output;

    fn get(&self, key: &str) -> Self::Output;
}

/// Write capability of an accessor object.
pub trait Settable {
    /// Write `value` under `key`. Returns `false` when the write was a no-op.
    fn set(&self, key: &str, value: impl Into<Value>) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_props() {
        assert!(is_internal("$parent"));
        assert!(is_internal("__instance"));
        assert!(is_internal(""));
        assert!(!is_internal("value"));
        assert!(!is_internal("_private"));
    }
}
