//! Variable Lifecycle Controller: the invoke/cancel/subscribe contract every
//! data variable and action satisfies.

pub mod record;
pub mod source;

pub use record::{
    ErrorCallback, EventHandler, InvokeState, ListenerKey, SuccessCallback, Variable,
    VariableBuilder, VariableEvent, VariableEventData, VariableKind,
};
pub use source::{DataSource, FnSource};

/// Errors from variable invocation and cancellation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VariableError {
    /// The backend answered with a status code (e.g. 401).
    #[error("service returned {status}: {message}")]
    Service { status: u16, message: String },
    /// Any other backend failure.
    #[error("invocation failed: {0}")]
    Failed(String),
    /// Superseded by a newer invocation, cancelled, or the owning scope was
    /// torn down while the request was in flight.
    #[error("invocation cancelled")]
    Cancelled,
    /// The variable was destroyed with its scope.
    #[error("variable `{0}` has been destroyed")]
    Destroyed(String),
}

impl VariableError {
    /// Service status code, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            VariableError::Service { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the backend rejected the caller's credentials.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_only_for_service_errors() {
        let err = VariableError::Service {
            status: 401,
            message: "expired".into(),
        };
        assert_eq!(err.status(), Some(401));
        assert!(err.is_unauthorized());
        assert_eq!(err.to_string(), "service returned 401: expired");
        assert_eq!(VariableError::Cancelled.status(), None);
        assert!(!VariableError::Failed("x".into()).is_unauthorized());
    }
}
