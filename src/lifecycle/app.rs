//! The application-level scope.

use std::fmt;
use std::rc::Rc;

use super::controller::ScopeController;
use super::{
    InitOutcome, LifecycleError, LifecycleTracker, Runtime, ScopeDefinition, ScopeStatus,
};
use crate::commit::StateStore;
use crate::proxy::{Scope, ScopeProxy};
use crate::variable::{Variable, VariableKind};

/// App scope: the parent every page waits for and inherits variables from.
///
/// Cloning yields another handle to the same scope.
#[derive(Clone)]
pub struct AppScope {
    pub(crate) ctl: Rc<ScopeController>,
    runtime: Runtime,
}

impl AppScope {
    /// Build the scope and register its variables in the runtime catalog.
    pub fn new(def: ScopeDefinition, runtime: &Runtime) -> Self {
        let ctl = ScopeController::build(def);
        for variable in ctl.own_variables() {
            runtime.catalog.register(variable.clone());
        }
        Self {
            ctl,
            runtime: runtime.clone(),
        }
    }

    /// Run startup and become ready. Fails only when called twice.
    pub async fn init(&self) -> Result<InitOutcome, LifecycleError> {
        if !self.ctl.begin()? {
            return Ok(InitOutcome::Aborted);
        }
        self.ctl.wire(&[]);
        Ok(self.ctl.start().await)
    }

    /// The app scope's name.
    pub fn name(&self) -> &str {
        self.ctl.name()
    }

    /// The app's backing scope.
    pub fn scope(&self) -> &Scope {
        self.ctl.scope()
    }

    /// Root wrapper for script access.
    pub fn proxy(&self) -> ScopeProxy {
        self.ctl.scope().proxy()
    }

    /// The app's commit store.
    pub fn store(&self) -> &Rc<StateStore> {
        self.ctl.store()
    }

    /// Current lifecycle status.
    pub fn status(&self) -> ScopeStatus {
        self.ctl.tracker().status()
    }

    /// Lifecycle status and event log.
    pub fn tracker(&self) -> &LifecycleTracker {
        self.ctl.tracker()
    }

    /// Look up a live variable by name.
    pub fn variable(&self, name: &str) -> Option<Rc<Variable>> {
        self.ctl.lookup(VariableKind::Variable, name)
    }

    /// Look up a live action by name.
    pub fn action(&self, name: &str) -> Option<Rc<Variable>> {
        self.ctl.lookup(VariableKind::Action, name)
    }

    /// Variables and actions currently wired into the app.
    pub fn live_variables(&self) -> Vec<Rc<Variable>> {
        self.ctl.live_variables()
    }

    /// Resolve once the app is ready (or torn down).
    pub async fn wait_ready(&self) -> ScopeStatus {
        self.ctl.tracker().wait_until(ScopeStatus::Ready).await
    }

    /// Run `hook` when the app becomes ready; immediately if it already is.
    pub fn on_ready(&self, hook: impl FnOnce() + 'static) {
        self.ctl.on_ready(hook);
    }

    /// Flush pending commits as one render.
    pub fn render(&self) -> bool {
        self.ctl.store().flush()
    }

    /// Tear down and drop the app's variables from the catalog. Idempotent.
    pub fn teardown(&self) {
        if !self.ctl.teardown() {
            return;
        }
        for variable in self.ctl.own_variables() {
            self.runtime.catalog.unregister(variable);
        }
    }
}

impl fmt::Debug for AppScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppScope")
            .field("name", &self.name())
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::ScopeConfig;
    use crate::proxy::LOADING_FIELD;
    use crate::testing::MockSource;
    use serde_json::json;

    fn app(runtime: &Runtime) -> AppScope {
        let user = Variable::builder("CurrentUser", MockSource::ok(json!({"id": 1}))).build();
        let logout = Variable::builder("Logout", MockSource::ok(json!(null)))
            .action()
            .build();
        AppScope::new(
            ScopeDefinition::new("App")
                .with_variable(user)
                .with_variable(logout)
                .with_config(
                    ScopeConfig::new()
                        .with_startup_variable("CurrentUser")
                        .with_settle_frames(0),
                ),
            runtime,
        )
    }

    #[test]
    fn new_registers_in_catalog() {
        let runtime = Runtime::new();
        let _app = app(&runtime);
        assert!(runtime.catalog.variable("CurrentUser").is_some());
        assert!(runtime.catalog.action("Logout").is_some());
    }

    #[tokio::test]
    async fn init_reaches_ready() {
        let runtime = Runtime::new();
        let app = app(&runtime);
        assert_eq!(app.init().await, Ok(InitOutcome::Ready));
        assert_eq!(app.status(), ScopeStatus::Ready);
        assert_eq!(
            app.variable("CurrentUser").unwrap().dataset().to_json(),
            json!({"id": 1})
        );
        assert_eq!(app.proxy().value(LOADING_FIELD).as_bool(), Some(false));
        assert_eq!(app.live_variables().len(), 2);
        assert!(matches!(
            app.init().await,
            Err(LifecycleError::AlreadyInitialized(_))
        ));
    }

    #[tokio::test]
    async fn teardown_before_init_aborts() {
        let runtime = Runtime::new();
        let app = app(&runtime);
        app.teardown();
        assert_eq!(app.init().await, Ok(InitOutcome::Aborted));
        assert!(runtime.catalog.is_empty());
    }
}
