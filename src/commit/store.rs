//! The host-side committed snapshot.
//!
//! Wrappers mutate their backing objects synchronously and then *schedule*
//! a [`StateUpdate`]. [`StateStore`] queues scheduled updates and applies
//! them on [`flush`](StateStore::flush), so any number of writes inside one
//! tick coalesce into a single render. Updates are applied in order (last
//! write wins) and are never discarded, except by a failed instance guard.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use super::update::{lookup, Applied, StateUpdate};
use crate::value::{ObjectRef, Value};

/// Receiver of scheduled commits.
pub trait CommitSink {
    /// Queue `update` for the next commit.
    fn schedule(&self, update: StateUpdate);
}

type RenderListener = Rc<dyn Fn(&ObjectRef)>;

/// Committed snapshot plus the queue of updates not yet applied.
pub struct StateStore {
    committed: RefCell<ObjectRef>,
    pending: RefCell<Vec<StateUpdate>>,
    scheduled: Cell<usize>,
    renders: Cell<usize>,
    dropped: Cell<usize>,
    listeners: RefCell<Vec<RenderListener>>,
}

impl StateStore {
    /// Create a store whose first committed snapshot is `initial` itself.
    pub fn new(initial: ObjectRef) -> Self {
        Self {
            committed: RefCell::new(initial),
            pending: RefCell::new(Vec::new()),
            scheduled: Cell::new(0),
            renders: Cell::new(0),
            dropped: Cell::new(0),
            listeners: RefCell::new(Vec::new()),
        }
    }

    /// The current committed root.
    pub fn snapshot(&self) -> ObjectRef {
        self.committed.borrow().clone()
    }

    /// Resolve `path` in the committed snapshot.
    pub fn lookup(&self, path: &[&str]) -> Option<Value> {
        let path: Vec<String> = path.iter().map(|s| (*s).to_owned()).collect();
        lookup(&self.committed.borrow(), &path)
    }

    /// Total number of updates ever scheduled.
    pub fn scheduled_count(&self) -> usize {
        self.scheduled.get()
    }

    /// Number of flushes that changed the snapshot.
    pub fn render_count(&self) -> usize {
        self.renders.get()
    }

    /// Number of updates rejected by an instance guard.
    pub fn dropped_count(&self) -> usize {
        self.dropped.get()
    }

    /// Updates waiting for the next flush.
    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Register a callback run after every rendering flush.
    pub fn on_render(&self, f: impl Fn(&ObjectRef) + 'static) {
        self.listeners.borrow_mut().push(Rc::new(f));
    }

    /// Apply every pending update as one commit.
    ///
    /// Returns `true` if a render happened. Updates scheduled by render
    /// listeners wait for the next flush.
    pub fn flush(&self) -> bool {
        let updates = std::mem::take(&mut *self.pending.borrow_mut());
        if updates.is_empty() {
            return false;
        }

        let mut root = self.snapshot();
        let mut changed = false;
        for update in &updates {
            match update.apply(&root) {
                Applied::Root(next) => {
                    root = next;
                    changed = true;
                }
                Applied::Dropped => self.dropped.set(self.dropped.get() + 1),
            }
        }
        if !changed {
            return false;
        }

        *self.committed.borrow_mut() = root.clone();
        self.renders.set(self.renders.get() + 1);
        trace!(updates = updates.len(), render = self.renders.get(), "commit flushed");

        let listeners: Vec<RenderListener> = self.listeners.borrow().clone();
        for listener in listeners {
            listener(&root);
        }
        true
    }
}

impl CommitSink for StateStore {
    fn schedule(&self, update: StateUpdate) {
        self.scheduled.set(self.scheduled.get() + 1);
        self.pending.borrow_mut().push(update);
    }
}

impl fmt::Debug for StateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStore")
            .field("scheduled", &self.scheduled.get())
            .field("renders", &self.renders.get())
            .field("dropped", &self.dropped.get())
            .field("pending", &self.pending.borrow().len())
            .finish()
    }
}
