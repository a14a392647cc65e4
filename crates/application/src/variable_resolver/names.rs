//! Name resolution against a project snapshot.
//!
//! Names resolve by exact, case-sensitive match on the effective name. Pending
//! variables (introduced by an open editor frame but not yet saved) are
//! consulted only when no persisted node matches.

use std::collections::{BTreeMap, HashMap};

use weft_domain::StringNode;

use super::parser::extract_references;

/// A variable introduced by an open frame but not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PendingVariable {
    /// Content it will be created with.
    pub content: String,
    /// Whether it will be created as a conditional container.
    pub is_conditional: bool,
}

impl PendingVariable {
    /// Creates a pending plain variable.
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_conditional: false,
        }
    }

    /// Creates a pending conditional variable.
    #[must_use]
    pub fn conditional(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_conditional: true,
        }
    }
}

/// Pending variables keyed by name.
pub type PendingVariables = BTreeMap<String, PendingVariable>;

/// What a name resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution<'a> {
    /// A persisted node carries the name.
    Found(&'a StringNode),
    /// An open frame introduced the name.
    Pending(&'a PendingVariable),
    /// Nothing carries the name.
    Unknown,
}

impl Resolution<'_> {
    /// Returns true for `Found`.
    #[must_use]
    pub const fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// Lookup table from effective name to node.
///
/// Building it is linear in the number of nodes; lookups are constant time.
/// When two nodes share a name the first one wins.
#[derive(Debug, Clone, Default)]
pub struct NameIndex<'a> {
    by_name: HashMap<&'a str, &'a StringNode>,
}

impl<'a> NameIndex<'a> {
    /// Indexes `nodes` by effective name.
    #[must_use]
    pub fn new(nodes: &'a [StringNode]) -> Self {
        let mut by_name = HashMap::with_capacity(nodes.len());
        for node in nodes {
            by_name.entry(node.effective_name()).or_insert(node);
        }
        Self { by_name }
    }

    /// Returns the node named `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&'a StringNode> {
        self.by_name.get(name).copied()
    }

    /// Returns true if a node is named `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }
}

/// Resolves names against persisted nodes, then pending variables.
#[derive(Debug, Clone)]
pub struct NameResolver<'a> {
    index: NameIndex<'a>,
    pending: &'a PendingVariables,
}

impl<'a> NameResolver<'a> {
    /// Creates a resolver over `nodes` and `pending`.
    #[must_use]
    pub fn new(nodes: &'a [StringNode], pending: &'a PendingVariables) -> Self {
        Self {
            index: NameIndex::new(nodes),
            pending,
        }
    }

    /// Resolves a single name.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Resolution<'a> {
        if let Some(node) = self.index.get(name) {
            return Resolution::Found(node);
        }
        self.pending
            .get(name)
            .map_or(Resolution::Unknown, Resolution::Pending)
    }

    /// Splits the references in `content` into known and new names.
    #[must_use]
    pub fn classify(&self, content: &str) -> ReferenceReport {
        let mut report = ReferenceReport::default();
        for name in extract_references(content) {
            if matches!(self.resolve(&name), Resolution::Unknown) {
                report.new.push(name);
            } else {
                report.existing.push(name);
            }
        }
        report
    }
}

/// Resolves `name` against `nodes`, then `pending`.
#[must_use]
pub fn resolve<'a>(
    name: &str,
    nodes: &'a [StringNode],
    pending: &'a PendingVariables,
) -> Resolution<'a> {
    NameResolver::new(nodes, pending).resolve(name)
}

/// Which references in a piece of content already exist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceReport {
    /// Names that match a persisted node or a pending variable.
    pub existing: Vec<String>,
    /// Names nothing carries yet.
    pub new: Vec<String>,
}

impl ReferenceReport {
    /// Returns true when every reference already exists.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.new.is_empty()
    }
}

/// Splits the references in `content` into known and new names.
#[must_use]
pub fn classify_references(
    content: &str,
    nodes: &[StringNode],
    pending: &PendingVariables,
) -> ReferenceReport {
    NameResolver::new(nodes, pending).classify(content)
}
