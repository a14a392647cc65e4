//! String nodes: the variables authors write and reference.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dimension::{DimensionId, DimensionValueId};

/// Stable identity of a persisted string node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Association between a node and one value of a dimension.
///
/// A node holding a value of the dimension named after a conditional
/// container is a spawn of that container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDimensionValue {
    /// The associated dimension value.
    pub dimension_value: DimensionValueId,
    /// The dimension the value belongs to.
    pub dimension: DimensionId,
    /// The value text (for spawns, the spawn's effective name).
    pub value: String,
}

/// A persisted string variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringNode {
    /// Stable identity assigned by the store.
    pub id: NodeId,

    /// Raw content, may contain `{{reference}}` placeholders.
    pub content: String,

    /// Optional author-chosen name.
    #[serde(default)]
    pub variable_name: Option<String>,

    /// System-generated name, always present and never edited.
    pub variable_hash: String,

    /// Whether this node is a conditional container resolved through its spawns.
    #[serde(default)]
    pub is_conditional_container: bool,

    /// Dimension values this node holds.
    #[serde(default)]
    pub dimension_values: Vec<NodeDimensionValue>,

    /// Creation timestamp reported by the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl StringNode {
    /// Creates a plain (non-conditional) node without a custom name.
    #[must_use]
    pub fn new(id: NodeId, variable_hash: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id,
            content: content.into(),
            variable_name: None,
            variable_hash: variable_hash.into(),
            is_conditional_container: false,
            dimension_values: Vec::new(),
            created_at: None,
        }
    }

    /// Sets the author-chosen name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.variable_name = Some(name.into());
        self
    }

    /// Marks the node as a conditional container.
    #[must_use]
    pub const fn conditional(mut self) -> Self {
        self.is_conditional_container = true;
        self
    }

    /// Adds a dimension value association.
    #[must_use]
    pub fn with_dimension_value(mut self, value: NodeDimensionValue) -> Self {
        self.dimension_values.push(value);
        self
    }

    /// Returns the name this node is referenced by.
    #[must_use]
    pub fn effective_name(&self) -> &str {
        effective_name(self.variable_name.as_deref(), &self.variable_hash)
    }

    /// Returns true if the node holds any value of the given dimension.
    #[must_use]
    pub fn belongs_to_dimension(&self, dimension: DimensionId) -> bool {
        self.dimension_values
            .iter()
            .any(|dv| dv.dimension == dimension)
    }
}

/// Computes an effective name: the custom name when set and non-empty, else the hash.
#[must_use]
pub fn effective_name<'a>(variable_name: Option<&'a str>, variable_hash: &'a str) -> &'a str {
    match variable_name {
        Some(name) if !name.is_empty() => name,
        _ => variable_hash,
    }
}
