//! Scope lifecycle controllers.
//!
//! An [`AppScope`] owns the application-wide variables; each [`PageScope`]
//! (pages and embedded prefabs) waits for the app, checks access, inherits
//! the app's variables, runs its startup work and fires content-ready once.
//! Process-wide state lives in an explicitly passed [`Runtime`].

pub mod access;
pub mod app;
pub mod catalog;
pub mod config;
pub mod definition;
pub mod page;
pub mod root;
pub mod status;

mod controller;

pub use access::{AccessCheck, AccessDecision, AllowAll, Predicate};
pub use app::AppScope;
pub use catalog::VariableCatalog;
pub use config::ScopeConfig;
pub use definition::{ScopeDefinition, ScriptHook};
pub use page::PageScope;
pub use root::RootHandle;
pub use status::{LifecycleEvent, LifecycleTracker, ScopeStatus};

/// Errors returned by scope initialization.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("scope `{0}` is already initialized")]
    AlreadyInitialized(String),
    /// Raised by author scripts; logged, never returned from `init`.
    #[error("script error: {0}")]
    Script(String),
}

/// How an `init` call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    Ready,
    /// The access check sent the user elsewhere.
    Redirected { to: String },
    /// The scope was torn down before initialization finished.
    Aborted,
}

/// Process-wide handles threaded through scope construction.
#[derive(Debug, Clone, Default)]
pub struct Runtime {
    pub root: RootHandle,
    pub catalog: VariableCatalog,
}

impl Runtime {
    /// Create a runtime with no active page and an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }
}
