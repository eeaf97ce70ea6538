//! Scope-local events: publish/subscribe for signals that are not state.

pub mod bus;

pub use bus::{EventBus, Subscription, SubscriptionKey};

/// Published on a scope bus when a variable fails with a service status
/// (e.g. 401). Payload: `{ variable, status, message }`.
pub const SERVICE_ERROR_EVENT: &str = "service:error";

/// Published once per scope after startup settles and the UI has painted.
pub const CONTENT_READY_EVENT: &str = "scope:content-ready";
