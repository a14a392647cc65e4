//! Application use cases (business logic orchestration).

mod commit_draft;

pub use commit_draft::*;
