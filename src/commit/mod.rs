//! Commit pipeline: scheduled updates and the committed snapshot.

pub mod store;
pub mod update;

pub use store::{CommitSink, StateStore};
pub use update::{lookup, path, Applied, InstanceGuard, StatePath, StateUpdate};
