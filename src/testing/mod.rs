//! Headless testing support: a mock data source and a runtime harness.
//!
//! Use [`MockSource`] to back variables with a scriptable, counting source,
//! and the [`Harness`] to drive an app and its active page without a host
//! renderer.

pub mod harness;
pub mod mock;

pub use harness::Harness;
pub use mock::{Gate, MockSource};
