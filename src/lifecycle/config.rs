//! Startup configuration of a scope.

use serde::{Deserialize, Serialize};

/// Per-scope startup configuration.
///
/// Loadable from the runtime's JSON page metadata (camelCase keys) or built
/// in code with the `with_*` methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScopeConfig {
    /// Actions invoked one after another, in order, at startup.
    pub startup_actions: Vec<String>,
    /// Variables invoked concurrently at startup.
    pub startup_variables: Vec<String>,
    /// Render frames to let pass before firing content-ready.
    pub settle_frames: u32,
    /// Whether a page waits for the app scope to become ready.
    pub wait_for_app: bool,
    /// Where a failed access check sends the user.
    pub access_redirect: String,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            startup_actions: Vec::new(),
            startup_variables: Vec::new(),
            settle_frames: 2,
            wait_for_app: true,
            access_redirect: String::from("login"),
        }
    }
}

impl ScopeConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from JSON; missing keys take their defaults.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Add a startup action (builder).
    pub fn with_startup_action(mut self, name: impl Into<String>) -> Self {
        self.startup_actions.push(name.into());
        self
    }

    /// Add a startup variable (builder).
    pub fn with_startup_variable(mut self, name: impl Into<String>) -> Self {
        self.startup_variables.push(name.into());
        self
    }

    /// Set the number of settle frames (builder).
    pub fn with_settle_frames(mut self, frames: u32) -> Self {
        self.settle_frames = frames;
        self
    }

    /// Set whether to wait for the app scope (builder).
    pub fn with_wait_for_app(mut self, wait: bool) -> Self {
        self.wait_for_app = wait;
        self
    }

    /// Set the access redirect target (builder).
    pub fn with_access_redirect(mut self, target: impl Into<String>) -> Self {
        self.access_redirect = target.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ScopeConfig::default();
        assert!(config.startup_actions.is_empty());
        assert_eq!(config.settle_frames, 2);
        assert!(config.wait_for_app);
        assert_eq!(config.access_redirect, "login");
    }

    #[test]
    fn builder_chain() {
        let config = ScopeConfig::new()
            .with_startup_action("Init")
            .with_startup_variable("Users")
            .with_startup_variable("Roles")
            .with_settle_frames(0)
            .with_wait_for_app(false)
            .with_access_redirect("home");
        assert_eq!(config.startup_actions, vec!["Init"]);
        assert_eq!(config.startup_variables, vec!["Users", "Roles"]);
        assert_eq!(config.settle_frames, 0);
        assert!(!config.wait_for_app);
        assert_eq!(config.access_redirect, "home");
    }

    #[test]
    fn from_json_uses_camel_case_and_defaults() {
        let config = ScopeConfig::from_json(
            r#"{"startupVariables": ["Users"], "waitForApp": false}"#,
        )
        .unwrap();
        assert_eq!(config.startup_variables, vec!["Users"]);
        assert!(!config.wait_for_app);
        assert_eq!(config.settle_frames, 2);
        assert!(ScopeConfig::from_json("[1]").is_err());
    }
}
