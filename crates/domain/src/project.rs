//! Project snapshots.
//!
//! A project is loaded wholesale from the store and replaced wholesale after
//! every successful commit. Nothing in the workspace patches a snapshot in place.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dimension::{Dimension, DimensionId};
use crate::error::{DomainError, DomainResult};
use crate::node::{NodeId, StringNode};

/// Identity of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub u64);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A snapshot of a project's nodes and dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Project identity.
    pub id: ProjectId,

    /// Display name.
    #[serde(default)]
    pub name: String,

    /// All string nodes. Order carries no meaning.
    #[serde(default)]
    pub strings: Vec<StringNode>,

    /// All dimensions.
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
}

impl Project {
    /// Creates an empty project.
    #[must_use]
    pub fn new(id: ProjectId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            strings: Vec::new(),
            dimensions: Vec::new(),
        }
    }

    /// Adds a node.
    #[must_use]
    pub fn with_node(mut self, node: StringNode) -> Self {
        self.strings.push(node);
        self
    }

    /// Adds a dimension.
    #[must_use]
    pub fn with_dimension(mut self, dimension: Dimension) -> Self {
        self.dimensions.push(dimension);
        self
    }

    /// Finds a node by id.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&StringNode> {
        self.strings.iter().find(|n| n.id == id)
    }

    /// Finds a node by effective name (exact, case-sensitive).
    #[must_use]
    pub fn node_named(&self, name: &str) -> Option<&StringNode> {
        self.strings.iter().find(|n| n.effective_name() == name)
    }

    /// Finds a dimension by id.
    #[must_use]
    pub fn dimension(&self, id: DimensionId) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.id == id)
    }

    /// Finds a dimension by name.
    #[must_use]
    pub fn dimension_named(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    /// Checks that effective names are unique across the project's nodes.
    ///
    /// # Errors
    /// Returns `DomainError::DuplicateName` for the first repeated name.
    pub fn validate_unique_names(&self) -> DomainResult<()> {
        let mut seen = HashSet::with_capacity(self.strings.len());
        for node in &self.strings {
            if !seen.insert(node.effective_name()) {
                return Err(DomainError::DuplicateName(node.effective_name().to_string()));
            }
        }
        Ok(())
    }

    /// Returns true if another node (not `except`) already uses `name`.
    #[must_use]
    pub fn name_taken(&self, name: &str, except: Option<NodeId>) -> bool {
        self.strings
            .iter()
            .any(|n| Some(n.id) != except && n.effective_name() == name)
    }
}
