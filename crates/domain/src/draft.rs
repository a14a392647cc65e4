//! Drafts: in-memory, uncommitted versions of string nodes.
//!
//! A draft lives inside exactly one editor frame. It is dropped on cancel and
//! promoted to a persisted node on commit.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::generate_draft_key;
use crate::node::{NodeId, StringNode};

/// Content of the spawn seeded into a brand-new conditional.
pub const DEFAULT_SPAWN_CONTENT: &str = "Default spawn content";

/// Content of a spawn appended interactively.
pub const NEW_SPAWN_CONTENT: &str = "New spawn content";

/// Returns a typed variable name without surrounding whitespace, or `None`
/// when nothing but whitespace was typed.
#[must_use]
pub fn custom_name(name: &str) -> Option<&str> {
    let name = name.trim();
    (!name.is_empty()).then_some(name)
}

/// An editable copy of a string node, with its working spawn list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    /// In-session identity. Node id text for persisted nodes, a draft key otherwise.
    pub key: String,

    /// The persisted node this draft edits, if any.
    pub node_id: Option<NodeId>,

    /// Working content.
    pub content: String,

    /// Working custom name. Empty means "use the hash".
    pub variable_name: String,

    /// Hash of the persisted node. `None` until the store assigns one.
    pub variable_hash: Option<String>,

    /// Whether the draft is a conditional container.
    pub is_conditional: bool,

    /// Ordered working spawn list (only meaningful when conditional).
    pub conditional_spawns: Vec<Self>,

    /// Whether the container's dimension should carry the `"Hidden"` value.
    pub include_hidden_option: bool,

    /// True for drafts that have never been persisted.
    pub temporary: bool,

    /// True for an existing variable reused as a spawn: it is linked on
    /// commit but its own fields are not saved.
    pub link_only: bool,

    /// True once any field was edited after opening.
    pub dirty: bool,
}

impl Draft {
    /// Creates a temporary, non-conditional draft.
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            key: generate_draft_key(),
            node_id: None,
            content: content.into(),
            variable_name: String::new(),
            variable_hash: None,
            is_conditional: false,
            conditional_spawns: Vec::new(),
            include_hidden_option: false,
            temporary: true,
            link_only: false,
            dirty: false,
        }
    }

    /// Creates a temporary conditional draft seeded with one default spawn.
    #[must_use]
    pub fn new_conditional(content: impl Into<String>, spawn_content: impl Into<String>) -> Self {
        let mut draft = Self::new(content);
        draft.is_conditional = true;
        draft.conditional_spawns.push(Self::new(spawn_content));
        draft
    }

    /// Creates a draft editing a persisted node.
    ///
    /// `spawns` must already be ordered; `include_hidden_option` comes from the
    /// container's dimension.
    #[must_use]
    pub fn from_node(node: &StringNode, spawns: &[&StringNode], include_hidden_option: bool) -> Self {
        Self {
            key: node.id.to_string(),
            node_id: Some(node.id),
            content: node.content.clone(),
            variable_name: node.variable_name.clone().unwrap_or_default(),
            variable_hash: Some(node.variable_hash.clone()),
            is_conditional: node.is_conditional_container,
            conditional_spawns: spawns
                .iter()
                .map(|spawn| Self::from_node(spawn, &[], false))
                .collect(),
            include_hidden_option: node.is_conditional_container && include_hidden_option,
            temporary: false,
            link_only: false,
            dirty: false,
        }
    }

    /// Creates a link-only spawn slot for an existing variable.
    #[must_use]
    pub fn linked(node: &StringNode) -> Self {
        let mut draft = Self::from_node(node, &[], false);
        draft.link_only = true;
        draft
    }

    /// Returns the name the draft will be referenced by, if it has one yet.
    #[must_use]
    pub fn effective_name(&self) -> Option<&str> {
        custom_name(&self.variable_name).or(self.variable_hash.as_deref())
    }

    /// Returns true if the draft has never been persisted.
    #[must_use]
    pub const fn is_new(&self) -> bool {
        self.node_id.is_none()
    }

    /// Replaces the content.
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.dirty = true;
    }

    /// Replaces the custom name.
    pub fn set_variable_name(&mut self, name: impl Into<String>) {
        self.variable_name = name.into();
        self.dirty = true;
    }

    /// Switches the conditional flag.
    ///
    /// Turning it on with an empty spawn list seeds exactly one spawn whose
    /// content is the draft's content, or `placeholder` when that is empty.
    /// Turning it off drops the spawn list and the Hidden option.
    pub fn set_conditional(&mut self, is_conditional: bool, placeholder: &str) {
        self.is_conditional = is_conditional;
        if is_conditional {
            if self.conditional_spawns.is_empty() {
                let seed = if self.content.is_empty() {
                    placeholder.to_string()
                } else {
                    self.content.clone()
                };
                self.conditional_spawns.push(Self::new(seed));
            }
        } else {
            self.conditional_spawns.clear();
            self.include_hidden_option = false;
        }
        self.dirty = true;
    }

    /// Sets whether the Hidden option is offered.
    pub fn set_include_hidden_option(&mut self, include: bool) {
        self.include_hidden_option = include;
        self.dirty = true;
    }

    /// Appends a temporary spawn and returns its index.
    pub fn add_spawn(&mut self, content: impl Into<String>) -> usize {
        self.conditional_spawns.push(Self::new(content));
        self.dirty = true;
        self.conditional_spawns.len() - 1
    }

    /// Appends an existing variable as a link-only spawn and returns its index.
    pub fn add_existing_spawn(&mut self, node: &StringNode) -> usize {
        self.conditional_spawns.push(Self::linked(node));
        self.dirty = true;
        self.conditional_spawns.len() - 1
    }

    /// Returns the spawn at `index`.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidDraft` when the slot does not exist.
    pub fn spawn(&self, index: usize) -> DomainResult<&Self> {
        self.conditional_spawns
            .get(index)
            .ok_or_else(|| Self::missing_slot(index))
    }

    /// Replaces the content of the spawn at `index`.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidDraft` when the slot does not exist.
    pub fn update_spawn_content(&mut self, index: usize, content: impl Into<String>) -> DomainResult<()> {
        let spawn = self
            .conditional_spawns
            .get_mut(index)
            .ok_or_else(|| Self::missing_slot(index))?;
        spawn.set_content(content);
        self.dirty = true;
        Ok(())
    }

    /// Replaces the whole spawn at `index`.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidDraft` when the slot does not exist.
    pub fn replace_spawn(&mut self, index: usize, spawn: Self) -> DomainResult<()> {
        let slot = self
            .conditional_spawns
            .get_mut(index)
            .ok_or_else(|| Self::missing_slot(index))?;
        *slot = spawn;
        self.dirty = true;
        Ok(())
    }

    /// Removes and returns the spawn at `index`.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidDraft` when the slot does not exist.
    pub fn remove_spawn(&mut self, index: usize) -> DomainResult<Self> {
        if index >= self.conditional_spawns.len() {
            return Err(Self::missing_slot(index));
        }
        self.dirty = true;
        Ok(self.conditional_spawns.remove(index))
    }

    fn missing_slot(index: usize) -> DomainError {
        DomainError::InvalidDraft(format!("no spawn at index {index}"))
    }
}
