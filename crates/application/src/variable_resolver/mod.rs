//! Variable resolution module
//!
//! Parsing of `{{name}}` references, name resolution against a project
//! snapshot, and recursive rendering for previews.
//!
//! # Usage
//!
//! ```
//! use weft_application::variable_resolver::{ContentRenderer, DimensionSelection};
//! use weft_domain::{NodeId, Project, ProjectId, StringNode};
//!
//! let project = Project::new(ProjectId(1), "demo")
//!     .with_node(StringNode::new(NodeId(1), "u1", "friend").with_name("user"));
//!
//! let selection = DimensionSelection::new();
//! let result = ContentRenderer::new(&project, &selection).render("Hi {{user}}");
//! assert_eq!(result.rendered, "Hi friend");
//! ```

pub mod engine;
pub mod names;
pub mod parser;

pub use engine::{ActiveSpawn, ContentRenderer, DimensionSelection, RenderResult};
pub use names::{
    NameIndex, NameResolver, PendingVariable, PendingVariables, ReferenceReport, Resolution,
    classify_references, resolve,
};
pub use parser::{Reference, extract_references, has_references, parse_references};
