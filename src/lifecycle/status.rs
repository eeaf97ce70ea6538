//! Scope lifecycle: status transitions and the event log.
//!
//! The `LifecycleTracker` holds a scope's [`ScopeStatus`] in a watch channel so
//! child scopes can await their parent, and accumulates [`LifecycleEvent`]s
//! that hosts and tests can drain.

use std::cell::RefCell;

use tokio::sync::watch;
use tracing::debug;

// ---------------------------------------------------------------------------
// ScopeStatus
// ---------------------------------------------------------------------------

/// Where a scope is in its lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScopeStatus {
    Uninitialized,
    Initializing,
    Ready,
    TornDown,
}

// ---------------------------------------------------------------------------
// LifecycleEvent
// ---------------------------------------------------------------------------

/// Events recorded during a scope's lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The scope moved between statuses.
    Status { from: ScopeStatus, to: ScopeStatus },
    /// The access check redirected instead of initializing.
    Redirected { to: String },
    /// Inherited variables were re-wired after the parent became ready.
    Resynced,
    /// The one-time content-ready notification fired.
    ContentReady,
}

// ---------------------------------------------------------------------------
// LifecycleTracker
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct LifecycleTracker {
    status: watch::Sender<ScopeStatus>,
    pending: RefCell<Vec<LifecycleEvent>>,
}

impl LifecycleTracker {
    /// Create a tracker in [`ScopeStatus::Uninitialized`].
    pub fn new() -> Self {
        let (status, _) = watch::channel(ScopeStatus::Uninitialized);
        Self {
            status,
            pending: RefCell::new(Vec::new()),
        }
    }

    /// Current status.
    pub fn status(&self) -> ScopeStatus {
        *self.status.borrow()
    }

    /// Move to `to`. Backwards and repeated transitions are ignored and
    /// return `false`.
    pub fn transition(&self, to: ScopeStatus) -> bool {
        let from = self.status();
        if to <= from {
            return false;
        }
        self.status.send_replace(to);
        debug!(?from, ?to, "scope status changed");
        self.record(LifecycleEvent::Status { from, to });
        true
    }

    /// A receiver observing every future transition.
    pub fn subscribe(&self) -> watch::Receiver<ScopeStatus> {
        self.status.subscribe()
    }

    /// Resolve once the status is at least `min` (or torn down).
    pub async fn wait_until(&self, min: ScopeStatus) -> ScopeStatus {
        let mut rx = self.status.subscribe();
        let reached = rx
            .wait_for(|s| *s >= min)
            .await
            .map(|s| *s);
        reached.unwrap_or(ScopeStatus::TornDown)
    }

    /// Append `event` to the pending log.
    pub fn record(&self, event: LifecycleEvent) {
        self.pending.borrow_mut().push(event);
    }

    /// Drain and return all pending lifecycle events.
    pub fn pending_events(&self) -> Vec<LifecycleEvent> {
        std::mem::take(&mut *self.pending.borrow_mut())
    }

    /// Whether any events are waiting to be drained.
    pub fn has_pending(&self) -> bool {
        !self.pending.borrow().is_empty()
    }
}

impl Default for LifecycleTracker {
    fn default() -> Self {
        Self::new()
    }
}
