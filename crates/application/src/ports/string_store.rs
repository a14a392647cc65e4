//! String store port
//!
//! Defines the interface for persisting string nodes and reloading project
//! snapshots. The engine never touches storage except through this trait.

use async_trait::async_trait;

use weft_domain::{Draft, NodeId, Project, ProjectId, custom_name};

/// Errors that can occur during store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Node or project not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The backend answered with an error status.
    #[error("HTTP {status}: {message}")]
    Http {
        /// Response status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// The request never completed (connection, timeout, TLS).
    #[error("Transport error: {0}")]
    Transport(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The write conflicts with existing data (for example a taken name).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Invalid node data.
    #[error("Invalid node: {0}")]
    Invalid(String),
}

/// A node to create because some content references it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNode {
    /// Initial content.
    pub content: String,
    /// Custom name; the store assigns a hash when absent.
    pub name: Option<String>,
    /// Whether the node is a conditional container.
    pub is_conditional: bool,
}

/// One entry of an ordered spawn list being saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnSave {
    /// Existing node to update or link, `None` to create.
    pub target: Option<NodeId>,
    /// Spawn content.
    pub content: String,
    /// Custom name, if any.
    pub name: Option<String>,
    /// True when the spawn is an existing variable that is only linked.
    pub link_only: bool,
}

impl SpawnSave {
    /// Builds a spawn entry from a working spawn draft.
    #[must_use]
    pub fn from_draft(spawn: &Draft) -> Self {
        Self {
            target: spawn.node_id,
            content: spawn.content.clone(),
            name: non_empty(&spawn.variable_name),
            link_only: spawn.link_only,
        }
    }
}

/// The ordered spawns of a conditional container, plus its Hidden option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnSet {
    /// Spawns in display order.
    pub spawns: Vec<SpawnSave>,
    /// Whether the container's dimension carries the `"Hidden"` value.
    pub include_hidden_option: bool,
}

/// A create-or-update of a single node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveNode {
    /// Node to update, `None` to create.
    pub target: Option<NodeId>,
    /// Content to store.
    pub content: String,
    /// Custom name, if any.
    pub name: Option<String>,
    /// Whether the node is a conditional container.
    pub is_conditional: bool,
    /// Ordered spawns, present only for conditional containers.
    pub spawns: Option<SpawnSet>,
}

/// Port for the persistence backend.
#[async_trait]
pub trait StringStore: Send + Sync {
    /// Creates a node and returns its id.
    ///
    /// # Errors
    /// Returns an error if the store rejects or fails the write.
    async fn create_node(&self, project: ProjectId, node: NewNode) -> Result<NodeId, StoreError>;

    /// Creates or updates a node, including the spawn list and dimension
    /// wiring of a conditional container. Returns the saved node's id.
    ///
    /// # Errors
    /// Returns an error if any part of the write fails.
    async fn save_node(&self, project: ProjectId, save: SaveNode) -> Result<NodeId, StoreError>;

    /// Loads a full project snapshot.
    ///
    /// # Errors
    /// Returns `StoreError::NotFound` if the project doesn't exist.
    async fn fetch_project(&self, project: ProjectId) -> Result<Project, StoreError>;
}

pub(crate) fn non_empty(value: &str) -> Option<String> {
    custom_name(value).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_spawn_name_matches_the_draft_effective_name() {
        let mut spawn = Draft::new("Free");
        spawn.variable_name = "  ".to_string();
        assert_eq!(SpawnSave::from_draft(&spawn).name, None);
        assert_eq!(spawn.effective_name(), None);

        spawn.variable_name = " tier_1 ".to_string();
        let save = SpawnSave::from_draft(&spawn);
        assert_eq!(save.name.as_deref(), Some("tier_1"));
        assert_eq!(save.name.as_deref(), spawn.effective_name());
    }
}
