//! The lifecycle machinery shared by app, page and prefab scopes.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use futures::future::join_all;
use tracing::{debug, error, info, warn};

use super::{
    InitOutcome, LifecycleError, LifecycleEvent, LifecycleTracker, ScopeConfig, ScopeDefinition,
    ScopeStatus, ScriptHook,
};
use crate::commit::StateStore;
use crate::event::CONTENT_READY_EVENT;
use crate::proxy::{
    Scope, Settable, Gettable, ACTIONS_FIELD, LOADING_FIELD, REGISTRY_FIELD, VARIABLES_FIELD,
};
use crate::value::{ObjectRef, Value};
use crate::variable::{ListenerKey, Variable, VariableEvent, VariableKind};

type ReadyHook = Box<dyn FnOnce()>;

fn table_for(kind: VariableKind) -> &'static str {
    match kind {
        VariableKind::Variable => VARIABLES_FIELD,
        VariableKind::Action => ACTIONS_FIELD,
    }
}

pub(crate) struct ScopeController {
    scope: Scope,
    store: Rc<StateStore>,
    tracker: LifecycleTracker,
    config: ScopeConfig,
    script: RefCell<Option<ScriptHook>>,
    own: Vec<Rc<Variable>>,
    watched: RefCell<Vec<(Rc<Variable>, ListenerKey)>>,
    content_ready: Cell<bool>,
    ready_hooks: RefCell<Vec<ReadyHook>>,
}

impl ScopeController {
    /// Build the backing state and the scope over it. Nothing runs yet.
    pub(crate) fn build(def: ScopeDefinition) -> Rc<Self> {
        let ScopeDefinition {
            name,
            state,
            variables,
            script,
            config,
        } = def;

        let root = state;
        if !root.get(REGISTRY_FIELD).is_some_and(|v| v.is_object()) {
            root.insert(REGISTRY_FIELD, Value::object());
        }
        root.insert(VARIABLES_FIELD, Value::object());
        root.insert(ACTIONS_FIELD, Value::object());
        root.insert(LOADING_FIELD, Value::Bool(true));

        // The committed root is its own allocation so root-level writes only
        // reach it through a commit.
        let store = Rc::new(StateStore::new(root.shallow_copy()));
        let scope = Scope::new(name, root, store.clone());
        Rc::new(Self {
            scope,
            store,
            tracker: LifecycleTracker::new(),
            config,
            script: RefCell::new(script),
            own: variables,
            watched: RefCell::new(Vec::new()),
            content_ready: Cell::new(false),
            ready_hooks: RefCell::new(Vec::new()),
        })
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub(crate) fn name(&self) -> &str {
        self.scope.name()
    }

    pub(crate) fn scope(&self) -> &Scope {
        &self.scope
    }

    pub(crate) fn store(&self) -> &Rc<StateStore> {
        &self.store
    }

    pub(crate) fn tracker(&self) -> &LifecycleTracker {
        &self.tracker
    }

    pub(crate) fn config(&self) -> &ScopeConfig {
        &self.config
    }

    pub(crate) fn own_variables(&self) -> &[Rc<Variable>] {
        &self.own
    }

    pub(crate) fn is_torn_down(&self) -> bool {
        self.tracker.status() == ScopeStatus::TornDown
    }

    fn table(&self, field: &str) -> Option<ObjectRef> {
        self.scope.backing().get(field)?.as_object().cloned()
    }

    /// The variable or action currently wired under `name`.
    pub(crate) fn lookup(&self, kind: VariableKind, name: &str) -> Option<Rc<Variable>> {
        let entry = self.table(table_for(kind))?.get(name)?;
        entry.as_variable().cloned()
    }

    /// Every variable and action wired into this scope.
    pub(crate) fn live_variables(&self) -> Vec<Rc<Variable>> {
        [VARIABLES_FIELD, ACTIONS_FIELD]
            .into_iter()
            .filter_map(|field| self.table(field))
            .flat_map(|table| table.entries())
            .filter_map(|(_, v)| v.as_variable().cloned())
            .collect()
    }

    // ── Initialization ───────────────────────────────────────────────

    /// Enter `Initializing`. `Ok(false)` means the scope was torn down
    /// before it started.
    pub(crate) fn begin(&self) -> Result<bool, LifecycleError> {
        match self.tracker.status() {
            ScopeStatus::Uninitialized => {
                self.tracker.transition(ScopeStatus::Initializing);
                info!(scope = %self.name(), "initializing scope");
                Ok(true)
            }
            ScopeStatus::TornDown => Ok(false),
            _ => Err(LifecycleError::AlreadyInitialized(self.name().to_owned())),
        }
    }

    /// Wire inherited variables, then the scope's own. Own declarations
    /// replace inherited ones of the same name.
    pub(crate) fn wire(self: &Rc<Self>, inherited: &[Rc<Variable>]) {
        for variable in inherited.iter().chain(self.own.iter()) {
            if let Some(table) = self.table(table_for(variable.kind())) {
                table.insert(variable.name(), Value::Variable(variable.clone()));
            }
            self.watch(variable);
        }
        for variable in &self.own {
            variable.route_errors_to(self.scope.bus());
        }
    }

    /// Re-wire inherited variables once the parent scope is ready. The
    /// writes go through the scope proxy so the host re-renders.
    pub(crate) fn resync(self: &Rc<Self>, inherited: &[Rc<Variable>]) {
        if self.is_torn_down() {
            return;
        }
        let root = self.scope.proxy();
        for variable in inherited {
            let shadowed = self
                .own
                .iter()
                .any(|own| own.name() == variable.name() && own.kind() == variable.kind());
            if shadowed {
                continue;
            }
            let Some(table) = root.get(table_for(variable.kind())).into_scope() else {
                continue;
            };
            if table.set(variable.name(), Value::Variable(variable.clone())) {
                self.watch(variable);
            }
        }
        self.tracker.record(LifecycleEvent::Resynced);
        debug!(scope = %self.name(), "inherited variables resynced");
    }

    /// Re-render this scope whenever `variable` settles.
    fn watch(self: &Rc<Self>, variable: &Rc<Variable>) {
        let already = self
            .watched
            .borrow()
            .iter()
            .any(|(v, _)| Rc::ptr_eq(v, variable));
        if already {
            return;
        }
        let weak: Weak<Self> = Rc::downgrade(self);
        let key = variable.subscribe(VariableEvent::AfterInvoke, move |_| {
            if let Some(ctl) = weak.upgrade() {
                if !ctl.is_torn_down() {
                    ctl.scope.refresh();
                }
            }
        });
        self.watched.borrow_mut().push((variable.clone(), key));
    }

    /// Run the author script. Failures are logged; the scope still proceeds
    /// to `Ready`.
    pub(crate) fn run_script(&self) {
        let Some(script) = self.script.borrow_mut().take() else {
            return;
        };
        if let Err(err) = script(&self.scope.proxy()) {
            error!(scope = %self.name(), error = %err, "scope script failed");
        }
    }

    /// Startup actions in order, then startup variables concurrently with
    /// settle-all semantics. Returns `false` if the scope was torn down
    /// meanwhile.
    pub(crate) async fn run_startup(&self) -> bool {
        for name in &self.config.startup_actions {
            let Some(action) = self.lookup(VariableKind::Action, name) else {
                warn!(scope = %self.name(), action = %name, "unknown startup action");
                continue;
            };
            if let Err(error) = action.invoke(None).await {
                warn!(scope = %self.name(), action = %name, %error, "startup action failed");
            }
            if self.is_torn_down() {
                return false;
            }
        }

        let variables: Vec<Rc<Variable>> = self
            .config
            .startup_variables
            .iter()
            .filter_map(|name| {
                let found = self.lookup(VariableKind::Variable, name);
                if found.is_none() {
                    warn!(scope = %self.name(), variable = %name, "unknown startup variable");
                }
                found
            })
            .collect();
        let results = join_all(variables.iter().map(|v| v.invoke(None))).await;
        for (variable, result) in variables.iter().zip(results) {
            if let Err(error) = result {
                warn!(
                    scope = %self.name(),
                    variable = %variable.name(),
                    %error,
                    "startup variable failed"
                );
            }
        }
        if self.is_torn_down() {
            return false;
        }

        self.scope.proxy().set(LOADING_FIELD, false);
        true
    }

    pub(crate) fn mark_ready(&self) {
        if !self.tracker.transition(ScopeStatus::Ready) {
            return;
        }
        info!(scope = %self.name(), "scope ready");
        let hooks = std::mem::take(&mut *self.ready_hooks.borrow_mut());
        for hook in hooks {
            hook();
        }
    }

    /// Run `hook` once this scope is ready; immediately if it already is.
    pub(crate) fn on_ready(&self, hook: impl FnOnce() + 'static) {
        match self.tracker.status() {
            ScopeStatus::Ready => hook(),
            ScopeStatus::TornDown => {}
            _ => self.ready_hooks.borrow_mut().push(Box::new(hook)),
        }
    }

    /// Let the configured number of render frames pass.
    pub(crate) async fn settle(&self) -> bool {
        for _ in 0..self.config.settle_frames {
            self.store.flush();
            tokio::task::yield_now().await;
            if self.is_torn_down() {
                return false;
            }
        }
        true
    }

    /// Fire content-ready. Only the first call has any effect.
    pub(crate) fn fire_content_ready(&self) -> bool {
        if self.content_ready.replace(true) {
            return false;
        }
        self.tracker.record(LifecycleEvent::ContentReady);
        self.scope
            .notify(CONTENT_READY_EVENT, &Value::from(self.name()));
        info!(scope = %self.name(), "content ready");
        true
    }

    pub(crate) fn content_ready_fired(&self) -> bool {
        self.content_ready.get()
    }

    /// Script, startup, ready, settle, content-ready.
    pub(crate) async fn start(&self) -> InitOutcome {
        self.run_script();
        if !self.run_startup().await {
            return InitOutcome::Aborted;
        }
        self.mark_ready();
        if !self.settle().await {
            return InitOutcome::Aborted;
        }
        self.fire_content_ready();
        InitOutcome::Ready
    }

    // ── Teardown ─────────────────────────────────────────────────────

    /// Unsubscribe everything, destroy own variables and clear the scope.
    /// Idempotent.
    pub(crate) fn teardown(&self) -> bool {
        if !self.tracker.transition(ScopeStatus::TornDown) {
            return false;
        }
        for (variable, key) in self.watched.borrow_mut().drain(..) {
            variable.unsubscribe(key);
        }
        for variable in &self.own {
            variable.destroy();
        }
        self.ready_hooks.borrow_mut().clear();
        self.scope.clear();
        info!(scope = %self.name(), "scope torn down");
        true
    }
}
