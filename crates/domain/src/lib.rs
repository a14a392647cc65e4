//! Weft Domain - Core business types
//!
//! This crate defines the domain model for the Weft string-variable editor:
//! string nodes, dimensions, project snapshots, drafts and editor frame state.
//! All types here are pure Rust with no I/O dependencies.

pub mod dimension;
pub mod draft;
pub mod error;
pub mod id;
pub mod node;
pub mod project;
pub mod settings;
pub mod state;

pub use dimension::{Dimension, DimensionId, DimensionValue, DimensionValueId, HIDDEN_VALUE};
pub use draft::{DEFAULT_SPAWN_CONTENT, Draft, NEW_SPAWN_CONTENT, custom_name};
pub use error::{DomainError, DomainResult};
pub use id::{generate_draft_key, is_draft_key};
pub use node::{NodeDimensionValue, NodeId, StringNode, effective_name};
pub use project::{Project, ProjectId};
pub use settings::{DEFAULT_MAX_RENDER_DEPTH, EditorSettings};
pub use state::{CloseReason, CommitErrorKind, FrameState};
