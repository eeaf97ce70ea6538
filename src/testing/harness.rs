//! Harness: drive an app and its active page without a host renderer.
//!
//! The `Harness` owns a [`Runtime`], an optional [`AppScope`] and the active
//! [`PageScope`], and provides methods to simulate script writes and widget
//! change reports, flush commits, and inspect the committed snapshot.

use crate::commit::StateStore;
use crate::lifecycle::{
    AppScope, InitOutcome, LifecycleError, PageScope, Runtime, ScopeDefinition,
};
use crate::proxy::{Gettable, Settable};
use crate::value::{ObjectRef, Value};

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// A headless runtime driver for tests.
///
/// # Examples
///
/// ```ignore
/// use scope_sync::lifecycle::ScopeDefinition;
/// use scope_sync::testing::Harness;
///
/// let mut harness = Harness::new();
/// harness.open_page(ScopeDefinition::new("Main")).await?;
/// harness.set_property("button1", "caption", "Save");
/// harness.render();
/// ```
#[derive(Debug, Default)]
pub struct Harness {
    runtime: Runtime,
    app: Option<AppScope>,
    page: Option<PageScope>,
}

impl Harness {
    /// Create a harness with no app and no page.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the app scope from `def`. It is not initialized yet.
    pub fn with_app(mut self, def: ScopeDefinition) -> Self {
        self.app = Some(AppScope::new(def, &self.runtime));
        self
    }

    /// Initialize the app scope, if there is one.
    pub async fn start_app(&self) -> Result<InitOutcome, LifecycleError> {
        match &self.app {
            Some(app) => app.init().await,
            None => Ok(InitOutcome::Aborted),
        }
    }

    /// Tear down the active page, then build and initialize a new one.
    pub async fn open_page(
        &mut self,
        def: ScopeDefinition,
    ) -> Result<InitOutcome, LifecycleError> {
        self.close_page();
        let page = PageScope::page(def, &self.runtime, self.app.as_ref());
        let page = self.page.insert(page);
        page.init().await
    }

    /// Tear down the active page, if any.
    pub fn close_page(&mut self) {
        if let Some(page) = self.page.take() {
            page.teardown();
        }
    }

    // ── Script simulation ────────────────────────────────────────────

    /// `Widgets[entity].setProperty(prop, value)` on the active page.
    pub fn set_property(&self, entity: &str, prop: &str, value: impl Into<Value>) -> bool {
        match &self.page {
            Some(page) => page.scope().registry().entity(entity).set_property(prop, value),
            None => false,
        }
    }

    /// `Widgets[entity][prop]` on the active page.
    pub fn property(&self, entity: &str, prop: &str) -> Value {
        match &self.page {
            Some(page) => page.scope().registry().entity(entity).value(prop),
            None => Value::Null,
        }
    }

    /// Write a root-level field of the active page.
    pub fn set_field(&self, field: &str, value: impl Into<Value>) -> bool {
        match &self.page {
            Some(page) => page.proxy().set(field, value),
            None => false,
        }
    }

    /// Read a root-level field of the active page.
    pub fn field(&self, field: &str) -> Value {
        match &self.page {
            Some(page) => page.proxy().get(field).to_value(),
            None => Value::Null,
        }
    }

    // ── Widget simulation ────────────────────────────────────────────

    /// Register an entity in the active page's registry, as a widget does
    /// when it mounts.
    pub fn mount(&self, name: &str, state: serde_json::Value) -> bool {
        match &self.page {
            Some(page) => page.scope().registry().set(name, Value::from(state)),
            None => false,
        }
    }

    /// Remove an entity from the active page's registry, as a widget does when it unmounts.
    pub fn unmount(&self, name: &str) -> bool {
        match &self.page {
            Some(page) => page.scope().registry().unmount(name),
            None => false,
        }
    }

    /// Report a widget-side change of `entity`.
    pub fn report_change(&self, entity: &str, partial: serde_json::Value) -> bool {
        let (Some(page), Value::Object(fields)) = (&self.page, Value::from(partial)) else {
            return false;
        };
        page.scope().on_change(entity, fields.entries())
    }

    // ── Processing ───────────────────────────────────────────────────

    /// Flush the active page's pending commits. Returns `true` if it
    /// rendered.
    pub fn render(&self) -> bool {
        self.page.as_ref().is_some_and(PageScope::render)
    }

    /// Simulate one frame: flush the app and the page, then yield to
    /// pending tasks.
    pub async fn tick(&self) {
        if let Some(app) = &self.app {
            app.render();
        }
        self.render();
        tokio::task::yield_now().await;
    }

    // ── Query ────────────────────────────────────────────────────────

    /// The shared runtime.
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// The app scope, if any.
    pub fn app(&self) -> Option<&AppScope> {
        self.app.as_ref()
    }

    /// The active page, if any.
    pub fn page(&self) -> Option<&PageScope> {
        self.page.as_ref()
    }

    /// The active page's commit store.
    pub fn store(&self) -> Option<&std::rc::Rc<StateStore>> {
        self.page.as_ref().map(PageScope::store)
    }

    /// Commits scheduled on the active page so far.
    pub fn commits(&self) -> usize {
        self.store().map_or(0, |store| store.scheduled_count())
    }

    /// The active page's committed snapshot.
    pub fn snapshot(&self) -> Option<ObjectRef> {
        self.store().map(|store| store.snapshot())
    }
}
