//! A scriptable, counting [`DataSource`] for tests.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::value::Value;
use crate::variable::{DataSource, VariableError};

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

/// Holds the next fetch open until [`open`](Gate::open) is called or the gate
/// is dropped.
#[derive(Debug)]
pub struct Gate {
    tx: oneshot::Sender<()>,
}

impl Gate {
    /// Release the held fetch.
    pub fn open(self) {
        let _ = self.tx.send(());
    }
}

// ---------------------------------------------------------------------------
// MockSource
// ---------------------------------------------------------------------------

/// Data source returning a fixed outcome, recording every call.
pub struct MockSource {
    outcome: RefCell<Result<Value, VariableError>>,
    gates: RefCell<VecDeque<oneshot::Receiver<()>>>,
    calls: Cell<usize>,
    cancel_calls: Cell<usize>,
    cancel_fails: Cell<bool>,
    last_params: RefCell<Option<Value>>,
}

impl MockSource {
    fn with_outcome(outcome: Result<Value, VariableError>) -> Rc<Self> {
        Rc::new(Self {
            outcome: RefCell::new(outcome),
            gates: RefCell::new(VecDeque::new()),
            calls: Cell::new(0),
            cancel_calls: Cell::new(0),
            cancel_fails: Cell::new(false),
            last_params: RefCell::new(None),
        })
    }

    /// Resolves every fetch with `data`.
    pub fn ok(data: serde_json::Value) -> Rc<Self> {
        Self::with_outcome(Ok(Value::from(data)))
    }

    /// Fails every fetch with `error`.
    pub fn failing(error: VariableError) -> Rc<Self> {
        Self::with_outcome(Err(error))
    }

    /// Change what later fetches return.
    pub fn respond(&self, data: serde_json::Value) {
        *self.outcome.borrow_mut() = Ok(Value::from(data));
    }

    /// Make later fetches fail with `error`.
    pub fn fail_with(&self, error: VariableError) {
        *self.outcome.borrow_mut() = Err(error);
    }

    /// Hold the next ungated fetch until the returned gate opens.
    pub fn gate(&self) -> Gate {
        let (tx, rx) = oneshot::channel();
        self.gates.borrow_mut().push_back(rx);
        Gate { tx }
    }

    /// Make `cancel` report a backend failure.
    pub fn fail_cancel(&self) {
        self.cancel_fails.set(true);
    }

    /// Number of fetches so far.
    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    /// Number of backend cancels so far.
    pub fn cancel_calls(&self) -> usize {
        self.cancel_calls.get()
    }

    /// Parameters of the most recent fetch.
    pub fn last_params(&self) -> Option<Value> {
        self.last_params.borrow().clone()
    }
}

#[async_trait(?Send)]
impl DataSource for MockSource {
    async fn fetch(&self, params: Value) -> Result<Value, VariableError> {
        self.calls.set(self.calls.get() + 1);
        *self.last_params.borrow_mut() = Some(params);
        let gate = self.gates.borrow_mut().pop_front();
        if let Some(gate) = gate {
            // a dropped gate releases the fetch too
            let _ = gate.await;
        }
        self.outcome.borrow().clone()
    }

    fn cancel(&self) -> Result<(), VariableError> {
        self.cancel_calls.set(self.cancel_calls.get() + 1);
        if self.cancel_fails.get() {
            Err(VariableError::Failed("cancel rejected".into()))
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for MockSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockSource")
            .field("calls", &self.calls.get())
            .field("cancel_calls", &self.cancel_calls.get())
            .field("gated", &self.gates.borrow().len())
            .finish()
    }
}
