//! # scope-sync
//!
//! Reactive state interception and synchronization for low-code widget
//! runtimes.
//!
//! Scripts and widgets read and write scope state (app, page and prefab
//! scopes) through typed accessor objects. Every write is visible to the next
//! synchronous read at once, and is committed to the host's rendered snapshot
//! as a path-minimal update that keeps untouched subtrees reference-stable.
//!
//! ## Core Systems
//!
//! - **[`value`]**: dynamic values with identity-bearing objects and arrays
//! - **[`commit`]**: path-minimal state updates and the committed snapshot
//! - **[`proxy`]**: scope, registry, entity and array accessors, overrides
//! - **[`event`]**: scope-local publish/subscribe
//! - **[`variable`]**: data variables and actions with an invoke lifecycle
//! - **[`lifecycle`]**: app, page and prefab scope controllers
//! - **[`testing`]**: mock data source and headless harness

// Foundation
pub mod value;

// State synchronization
pub mod commit;
pub mod proxy;

// Events and data
pub mod event;
pub mod variable;

// Scope lifecycle
pub mod lifecycle;

// Testing
pub mod testing;

pub use commit::{StateStore, StateUpdate};
pub use lifecycle::{AppScope, InitOutcome, PageScope, Runtime, ScopeConfig, ScopeDefinition};
pub use proxy::{EntityProxy, Gettable, RegistryProxy, Scope, ScopeProxy, Settable};
pub use value::{ObjectRef, Value};
pub use variable::{Variable, VariableError};
