//! The contract concrete data variables (REST, CRUD, service calls) satisfy.

use std::fmt;

use async_trait::async_trait;

use super::VariableError;
use crate::value::Value;

/// A data-fetching or action backend behind a [`Variable`](super::Variable).
///
/// Implementations are single-threaded; the returned futures need not be
/// `Send`.
#[async_trait(?Send)]
pub trait DataSource {
    /// Perform the operation with the effective parameters.
    async fn fetch(&self, params: Value) -> Result<Value, VariableError>;

    /// Abort any in-flight request on the backend side.
    fn cancel(&self) -> Result<(), VariableError> {
        Ok(())
    }
}

/// [`DataSource`] backed by a synchronous closure. Suits actions such as
/// navigation or notifications that complete immediately.
pub struct FnSource<F> {
    f: F,
}

impl<F> FnSource<F>
where
    F: Fn(&Value) -> Result<Value, VariableError>,
{
    /// Wrap `f` as a data source.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait(?Send)]
impl<F> DataSource for FnSource<F>
where
    F: Fn(&Value) -> Result<Value, VariableError>,
{
    async fn fetch(&self, params: Value) -> Result<Value, VariableError> {
        (self.f)(&params)
    }
}

impl<F> fmt::Debug for FnSource<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnSource")
    }
}
