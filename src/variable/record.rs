//! Variable records and their invocation state machine.
//!
//! ```text
//! Idle ──invoke──▶ Invoking ──▶ Succeeded ─┐
//!                      │                  ├──▶ Idle
//!                      └──────▶ Failed ────┘
//! ```
//!
//! `BeforeInvoke` fires synchronously as an invocation starts, `Success` or
//! `Error` once the source settles, and `AfterInvoke` after either. An
//! invocation superseded by a newer one or cancelled resolves as
//! [`VariableError::Cancelled`]; its `AfterInvoke` fires at the moment it is
//! aborted, carrying that error. A destroyed variable fires nothing further.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use futures::future::{abortable, AbortHandle};
use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};
use tracing::{debug, warn};

use super::source::DataSource;
use super::VariableError;
use crate::event::{EventBus, SERVICE_ERROR_EVENT};
use crate::value::{ObjectRef, Value};

new_key_type! {
    /// Identifies one lifecycle listener on a variable.
    pub struct ListenerKey;
}

/// Whether a record fetches data or performs an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableKind {
    Variable,
    Action,
}

/// Lifecycle phases a listener can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableEvent {
    BeforeInvoke,
    Success,
    Error,
    AfterInvoke,
}

/// Where a variable is in its invocation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeState {
    Idle,
    Invoking,
    Succeeded,
    Failed,
}

/// What lifecycle listeners receive.
#[derive(Debug, Clone)]
pub struct VariableEventData {
    pub variable: String,
    pub event: VariableEvent,
    pub params: Value,
    pub data: Option<Value>,
    pub error: Option<VariableError>,
}

/// Listener for a variable lifecycle phase.
pub type EventHandler = Rc<dyn Fn(&VariableEventData)>;
/// One-shot callback run with the fetched data.
pub type SuccessCallback = Box<dyn FnOnce(&Value)>;
/// One-shot callback run with the invocation error.
pub type ErrorCallback = Box<dyn FnOnce(&VariableError)>;

type ParamProvider = Box<dyn Fn() -> Value>;

struct InFlight {
    handle: AbortHandle,
    params: Value,
}

/// A configured data-fetch or action object.
pub struct Variable {
    name: String,
    kind: VariableKind,
    source: Rc<dyn DataSource>,
    inputs: ObjectRef,
    provider: RefCell<Option<ParamProvider>>,
    last_params: RefCell<Option<Value>>,
    dataset: RefCell<Value>,
    state: Cell<InvokeState>,
    executing: Cell<bool>,
    listeners: RefCell<SlotMap<ListenerKey, (VariableEvent, EventHandler)>>,
    in_flight: RefCell<Option<InFlight>>,
    generation: Cell<u64>,
    alive: Cell<bool>,
    errors: RefCell<Option<EventBus>>,
}

/// Builder for [`Variable`].
pub struct VariableBuilder {
    name: String,
    kind: VariableKind,
    source: Rc<dyn DataSource>,
    params: Vec<(String, Value)>,
    dataset: Value,
}

impl VariableBuilder {
    /// Mark the record as an action.
    pub fn action(mut self) -> Self {
        self.kind = VariableKind::Action;
        self
    }

    /// Set the record kind.
    pub fn kind(mut self, kind: VariableKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set a default input parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Initial dataset before the first invocation.
    pub fn dataset(mut self, dataset: impl Into<Value>) -> Self {
        self.dataset = dataset.into();
        self
    }

    /// Finish building.
    pub fn build(self) -> Rc<Variable> {
        Rc::new(Variable {
            name: self.name,
            kind: self.kind,
            source: self.source,
            inputs: ObjectRef::from_pairs(self.params),
            provider: RefCell::new(None),
            last_params: RefCell::new(None),
            dataset: RefCell::new(self.dataset),
            state: Cell::new(InvokeState::Idle),
            executing: Cell::new(false),
            listeners: RefCell::new(SlotMap::with_key()),
            in_flight: RefCell::new(None),
            generation: Cell::new(0),
            alive: Cell::new(true),
            errors: RefCell::new(None),
        })
    }
}

impl Variable {
    /// Start building a variable over `source`.
    pub fn builder(name: impl Into<String>, source: Rc<dyn DataSource>) -> VariableBuilder {
        VariableBuilder {
            name: name.into(),
            kind: VariableKind::Variable,
            source,
            params: Vec::new(),
            dataset: Value::Null,
        }
    }

    /// The variable's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this is a variable or an action.
    pub fn kind(&self) -> VariableKind {
        self.kind
    }

    /// The last successfully fetched data.
    pub fn dataset(&self) -> Value {
        self.dataset.borrow().clone()
    }

    /// Whether an invocation is in flight.
    pub fn is_executing(&self) -> bool {
        self.executing.get()
    }

    /// Current invocation state.
    pub fn state(&self) -> InvokeState {
        self.state.get()
    }

    /// Whether the owning scope is still mounted.
    pub fn is_alive(&self) -> bool {
        self.alive.get()
    }

    /// Set a script-provided input parameter. Script inputs take precedence
    /// over bound parameters.
    pub fn set_input(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.inputs.insert(key, value.into());
    }

    /// Bind a UI-side parameter provider, re-read on every invocation and by
    /// [`invoke_on_param_change`](Self::invoke_on_param_change).
    pub fn bind_params(&self, provider: impl Fn() -> Value + 'static) {
        *self.provider.borrow_mut() = Some(Box::new(provider));
    }

    /// The effective parameters: bound values with script inputs on top.
    pub fn params(&self) -> Value {
        let merged = ObjectRef::new();
        let bound = self.provider.borrow().as_ref().map(|provider| provider());
        if let Some(Value::Object(bound)) = bound {
            for (k, v) in bound.entries() {
                merged.insert(k, v);
            }
        }
        for (k, v) in self.inputs.entries() {
            merged.insert(k, v);
        }
        Value::Object(merged)
    }

    /// Snapshot of the parameters used by the most recent invocation.
    pub fn last_params(&self) -> Option<Value> {
        self.last_params.borrow().clone()
    }

    /// Publish service errors on `bus` under [`SERVICE_ERROR_EVENT`].
    pub fn route_errors_to(&self, bus: EventBus) {
        *self.errors.borrow_mut() = Some(bus);
    }

    // ── Listeners ────────────────────────────────────────────────────

    /// Listen to `event` on every invocation.
    pub fn subscribe(
        &self,
        event: VariableEvent,
        handler: impl Fn(&VariableEventData) + 'static,
    ) -> ListenerKey {
        self.listeners
            .borrow_mut()
            .insert((event, Rc::new(handler)))
    }

    /// Returns `false` if the listener was already removed.
    pub fn unsubscribe(&self, key: ListenerKey) -> bool {
        self.listeners.borrow_mut().remove(key).is_some()
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    fn emit(
        &self,
        event: VariableEvent,
        params: &Value,
        data: Option<&Value>,
        error: Option<&VariableError>,
    ) {
        let handlers: Vec<EventHandler> = self
            .listeners
            .borrow()
            .values()
            .filter(|(e, _)| *e == event)
            .map(|(_, h)| h.clone())
            .collect();
        if handlers.is_empty() {
            return;
        }
        let payload = VariableEventData {
            variable: self.name.clone(),
            event,
            params: params.clone(),
            data: data.cloned(),
            error: error.cloned(),
        };
        for handler in handlers {
            handler(&payload);
        }
    }

    // ── Invocation ───────────────────────────────────────────────────

    /// Invoke with optional extra inputs. Never fails synchronously; errors
    /// are delivered through the `Error` phase and the returned result.
    pub async fn invoke(&self, params: Option<Value>) -> Result<Value, VariableError> {
        self.invoke_with(params, None, None).await
    }

    /// Invoke with one-shot success and error callbacks.
    pub async fn invoke_with(
        &self,
        params: Option<Value>,
        on_success: Option<SuccessCallback>,
        on_error: Option<ErrorCallback>,
    ) -> Result<Value, VariableError> {
        if !self.alive.get() {
            return Err(VariableError::Destroyed(self.name.clone()));
        }
        if let Some(Value::Object(extra)) = params {
            for (k, v) in extra.entries() {
                self.inputs.insert(k, v);
            }
        }

        let params = self.params();
        *self.last_params.borrow_mut() = Some(params.deep_clone());

        if self.abort_in_flight() {
            debug!(variable = %self.name, "superseded in-flight invocation");
        }
        let generation = self.generation.get() + 1;
        self.generation.set(generation);

        let (request, handle) = abortable(self.source.fetch(params.clone()));
        *self.in_flight.borrow_mut() = Some(InFlight {
            handle,
            params: params.clone(),
        });
        self.executing.set(true);
        self.state.set(InvokeState::Invoking);
        self.emit(VariableEvent::BeforeInvoke, &params, None, None);

        let outcome = request.await;

        if !self.alive.get() {
            debug!(variable = %self.name, "result discarded after teardown");
            return Err(VariableError::Cancelled);
        }
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(_aborted) => return Err(VariableError::Cancelled),
        };
        if self.generation.get() != generation {
            return Err(VariableError::Cancelled);
        }
        self.in_flight.borrow_mut().take();

        match &outcome {
            Ok(data) => {
                *self.dataset.borrow_mut() = data.clone();
                self.state.set(InvokeState::Succeeded);
                self.emit(VariableEvent::Success, &params, Some(data), None);
                if let Some(callback) = on_success {
                    callback(data);
                }
            }
            Err(error) => {
                warn!(variable = %self.name, %error, "invocation failed");
                self.state.set(InvokeState::Failed);
                self.route_error(error);
                self.emit(VariableEvent::Error, &params, None, Some(error));
                if let Some(callback) = on_error {
                    callback(error);
                }
            }
        }

        self.executing.set(false);
        self.emit(
            VariableEvent::AfterInvoke,
            &params,
            outcome.as_ref().ok(),
            outcome.as_ref().err(),
        );
        self.state.set(InvokeState::Idle);
        outcome
    }

    /// Re-invoke only if the effective parameters differ (deeply) from the
    /// last invocation's snapshot. Returns `None` when nothing changed.
    pub async fn invoke_on_param_change(&self) -> Option<Result<Value, VariableError>> {
        let fresh = self.params();
        let unchanged = self
            .last_params
            .borrow()
            .as_ref()
            .is_some_and(|last| last.deep_eq(&fresh));
        if unchanged {
            return None;
        }
        Some(self.invoke(None).await)
    }

    fn route_error(&self, error: &VariableError) {
        let Some(status) = error.status() else {
            return;
        };
        let bus = self.errors.borrow().clone();
        if let Some(bus) = bus {
            let payload = ObjectRef::from_pairs([
                ("variable", Value::from(self.name.as_str())),
                ("status", Value::from(u32::from(status))),
                ("message", Value::from(error.to_string())),
            ]);
            bus.notify(SERVICE_ERROR_EVENT, &Value::Object(payload));
        }
    }

    /// Abort the in-flight request and settle it as cancelled. Returns
    /// `false` if nothing was in flight.
    fn abort_in_flight(&self) -> bool {
        let Some(previous) = self.in_flight.borrow_mut().take() else {
            return false;
        };
        previous.handle.abort();
        self.executing.set(false);
        self.state.set(InvokeState::Idle);
        if self.alive.get() {
            self.emit(
                VariableEvent::AfterInvoke,
                &previous.params,
                None,
                Some(&VariableError::Cancelled),
            );
        }
        true
    }

    /// Abort the in-flight request, if any. Backend cancel failures are
    /// logged, never returned.
    pub fn cancel(&self) {
        if self.abort_in_flight() {
            if let Err(error) = self.source.cancel() {
                warn!(variable = %self.name, %error, "cancel failed");
            }
        }
        self.generation.set(self.generation.get() + 1);
        self.executing.set(false);
        self.state.set(InvokeState::Idle);
    }

    /// Mark unmounted, cancel, and drop every listener. Idempotent.
    pub fn destroy(&self) {
        if !self.alive.replace(false) {
            return;
        }
        self.cancel();
        self.listeners.borrow_mut().clear();
        self.errors.borrow_mut().take();
        debug!(variable = %self.name, "destroyed");
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("state", &self.state.get())
            .field("executing", &self.executing.get())
            .field("alive", &self.alive.get())
            .finish()
    }
}
