//! Ports (interfaces) for external dependencies
//!
//! Following hexagonal architecture, these traits define the contracts
//! that infrastructure adapters must implement.

mod project_sink;
mod string_store;

pub use project_sink::ProjectSink;
pub(crate) use string_store::non_empty;
pub use string_store::{NewNode, SaveNode, SpawnSave, SpawnSet, StoreError, StringStore};
