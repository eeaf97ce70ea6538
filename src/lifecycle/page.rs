//! Page and prefab scopes.

use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, info};

use super::controller::ScopeController;
use super::{
    AccessCheck, AccessDecision, AllowAll, AppScope, InitOutcome, LifecycleError,
    LifecycleEvent, LifecycleTracker, Runtime, ScopeDefinition, ScopeStatus,
};
use crate::commit::StateStore;
use crate::proxy::{Scope, ScopeProxy};
use crate::variable::{Variable, VariableKind};

enum Embedding {
    Page,
    /// A reusable component instance rendered as entity `entity` of `owner`.
    Prefab { owner: Scope, entity: String },
}

/// A page, or a prefab embedded in another scope.
///
/// Holds a one-way handle to the app scope; the app never references its
/// pages.
pub struct PageScope {
    ctl: Rc<ScopeController>,
    app: Option<AppScope>,
    runtime: Runtime,
    access: Rc<dyn AccessCheck>,
    embedding: Embedding,
}

impl PageScope {
    /// Build a page scope. Pages run the access check and own the root handle while active.
    pub fn page(def: ScopeDefinition, runtime: &Runtime, app: Option<&AppScope>) -> Self {
        Self::build(def, runtime, app, Embedding::Page)
    }

    /// A prefab scope whose root-level writes mirror into `entity` of
    /// `owner`. Prefabs skip the access check and never become the root.
    pub fn prefab(
        def: ScopeDefinition,
        runtime: &Runtime,
        app: Option<&AppScope>,
        owner: &Scope,
        entity: impl Into<String>,
    ) -> Self {
        let embedding = Embedding::Prefab {
            owner: owner.clone(),
            entity: entity.into(),
        };
        Self::build(def, runtime, app, embedding)
    }

    fn build(
        def: ScopeDefinition,
        runtime: &Runtime,
        app: Option<&AppScope>,
        embedding: Embedding,
    ) -> Self {
        Self {
            ctl: ScopeController::build(def),
            app: app.cloned(),
            runtime: runtime.clone(),
            access: Rc::new(AllowAll),
            embedding,
        }
    }

    /// Replace the access check (builder).
    pub fn with_access(mut self, access: impl AccessCheck + 'static) -> Self {
        self.access = Rc::new(access);
        self
    }

    /// Whether this scope is embedded in another page.
    pub fn is_prefab(&self) -> bool {
        matches!(self.embedding, Embedding::Prefab { .. })
    }

    /// Wait for the app, check access, wire variables and run startup.
    ///
    /// Fails only when called twice. A denied access check yields
    /// [`InitOutcome::Redirected`]; teardown while waiting yields
    /// [`InitOutcome::Aborted`].
    pub async fn init(&self) -> Result<InitOutcome, LifecycleError> {
        if !self.ctl.begin()? {
            return Ok(InitOutcome::Aborted);
        }

        if let Some(app) = &self.app {
            if self.ctl.config().wait_for_app {
                app.wait_ready().await;
                if self.ctl.is_torn_down() {
                    return Ok(InitOutcome::Aborted);
                }
            }
        }

        if let Embedding::Page = self.embedding {
            let redirect = match self.access.check(self.name()).await {
                AccessDecision::Granted => None,
                AccessDecision::Denied => Some(self.ctl.config().access_redirect.clone()),
                AccessDecision::Redirect(to) => Some(to),
            };
            if let Some(to) = redirect {
                info!(scope = %self.name(), to = %to, "access denied, redirecting");
                self.ctl
                    .tracker()
                    .record(LifecycleEvent::Redirected { to: to.clone() });
                return Ok(InitOutcome::Redirected { to });
            }
            if self.ctl.is_torn_down() {
                return Ok(InitOutcome::Aborted);
            }
        }

        let inherited = self.inherited();
        self.ctl.wire(&inherited);

        match &self.embedding {
            Embedding::Page => self.runtime.root.activate(self.ctl.scope()),
            Embedding::Prefab { owner, entity } => {
                self.ctl.scope().set_owner(owner, entity.clone());
            }
        }

        Ok(self.ctl.start().await)
    }

    /// The app's live variables if it is ready; otherwise the catalog, with
    /// a resync owed once the app gets there.
    fn inherited(&self) -> Vec<Rc<Variable>> {
        let Some(app) = &self.app else {
            return self.catalog_variables();
        };
        if app.status() == ScopeStatus::Ready {
            return app.live_variables();
        }

        debug!(scope = %self.name(), "app not ready, using catalog variables");
        let page: Weak<ScopeController> = Rc::downgrade(&self.ctl);
        let parent: Weak<ScopeController> = Rc::downgrade(&app.ctl);
        app.on_ready(move || {
            if let (Some(page), Some(parent)) = (page.upgrade(), parent.upgrade()) {
                page.resync(&parent.live_variables());
            }
        });
        self.catalog_variables()
    }

    fn catalog_variables(&self) -> Vec<Rc<Variable>> {
        let mut all = self.runtime.catalog.variables();
        all.extend(self.runtime.catalog.actions());
        all
    }

    // ── Accessors ────────────────────────────────────────────────────

    /// The scope name.
    pub fn name(&self) -> &str {
        self.ctl.name()
    }

    /// The backing scope.
    pub fn scope(&self) -> &Scope {
        self.ctl.scope()
    }

    /// Accessor over the scope's root object.
    pub fn proxy(&self) -> ScopeProxy {
        self.ctl.scope().proxy()
    }

    /// The scope's commit store.
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

    /// Whether content-ready has fired.
    pub fn content_ready_fired(&self) -> bool {
        self.ctl.content_ready_fired()
    }

    /// Look up a live variable by name, local or inherited.
    pub fn variable(&self, name: &str) -> Option<Rc<Variable>> {
        self.ctl.lookup(VariableKind::Variable, name)
    }

    /// Look up a live action by name, local or inherited.
    pub fn action(&self, name: &str) -> Option<Rc<Variable>> {
        self.ctl.lookup(VariableKind::Action, name)
    }

    /// Flush pending commits as one render.
    pub fn render(&self) -> bool {
        self.ctl.store().flush()
    }

    /// Tear down and release the root handle if this page holds it.
    /// Idempotent.
    pub fn teardown(&self) {
        let active = matches!(self.embedding, Embedding::Page);
        if active {
            self.runtime.root.release(self.ctl.scope());
        }
        self.ctl.teardown();
    }
}

impl fmt::Debug for PageScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageScope")
            .field("name", &self.name())
            .field("status", &self.status())
            .field("prefab", &self.is_prefab())
            .finish()
    }
}
