//! Declarative description of a scope, as handed over by the runtime.

use std::fmt;
use std::rc::Rc;

use super::{LifecycleError, ScopeConfig};
use crate::proxy::ScopeProxy;
use crate::value::{ObjectRef, Value};
use crate::variable::Variable;

/// Author script run once against the scope root during initialization.
pub type ScriptHook = Box<dyn FnOnce(&ScopeProxy) -> Result<(), LifecycleError>>;

/// Everything needed to build one app, page or prefab scope.
pub struct ScopeDefinition {
    pub(crate) name: String,
    pub(crate) state: ObjectRef,
    pub(crate) variables: Vec<Rc<Variable>>,
    pub(crate) script: Option<ScriptHook>,
    pub(crate) config: ScopeConfig,
}

impl ScopeDefinition {
    /// Start a definition with empty state and default config.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: ObjectRef::new(),
            variables: Vec::new(),
            script: None,
            config: ScopeConfig::default(),
        }
    }

    /// The scope name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The startup configuration.
    pub fn config(&self) -> &ScopeConfig {
        &self.config
    }

    /// Initial author fields. Non-object JSON is ignored.
    pub fn with_state(mut self, state: serde_json::Value) -> Self {
        if let Value::Object(obj) = Value::from(state) {
            self.state = obj;
        }
        self
    }

    /// Initial author fields from an existing object.
    pub fn with_state_object(mut self, state: ObjectRef) -> Self {
        self.state = state;
        self
    }

    /// Declare a scope-local variable or action (by its kind).
    pub fn with_variable(mut self, variable: Rc<Variable>) -> Self {
        self.variables.push(variable);
        self
    }

    /// Run `script` against the scope before startup (builder).
    pub fn with_script(
        mut self,
        script: impl FnOnce(&ScopeProxy) -> Result<(), LifecycleError> + 'static,
    ) -> Self {
        self.script = Some(Box::new(script));
        self
    }

    /// Replace the startup configuration (builder).
    pub fn with_config(mut self, config: ScopeConfig) -> Self {
        self.config = config;
        self
    }
}

impl fmt::Debug for ScopeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.variables.iter().map(|v| v.name()).collect();
        f.debug_struct("ScopeDefinition")
            .field("name", &self.name)
            .field("variables", &names)
            .field("script", &self.script.is_some())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn with_state_accepts_objects_only() {
        let def = ScopeDefinition::new("Main").with_state(json!({"title": "x"}));
        assert_eq!(def.state.get("title").unwrap().as_str(), Some("x"));

        let def = ScopeDefinition::new("Main").with_state(json!([1, 2]));
        assert!(def.state.is_empty());
    }

    #[test]
    fn builder_collects_parts() {
        let def = ScopeDefinition::new("Main")
            .with_config(ScopeConfig::new().with_settle_frames(0))
            .with_script(|_| Ok(()));
        assert_eq!(def.name(), "Main");
        assert_eq!(def.config().settle_frames, 0);
        assert!(def.script.is_some());
    }
}
