//! Content rendering engine
//!
//! Expands `{{name}}` references recursively against a project snapshot.
//! Conditional containers expand through their active spawn, chosen by a
//! dimension selection.

use std::collections::HashMap;

use weft_domain::{DEFAULT_MAX_RENDER_DEPTH, DimensionId, HIDDEN_VALUE, Project, StringNode};

use super::names::NameIndex;
use super::parser::parse_references;
use crate::graph::spawns_of;

/// Selected value per dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DimensionSelection {
    selected: HashMap<DimensionId, String>,
}

impl DimensionSelection {
    /// Creates an empty selection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects `value` for `dimension`.
    #[must_use]
    pub fn with(mut self, dimension: DimensionId, value: impl Into<String>) -> Self {
        self.select(dimension, value);
        self
    }

    /// Selects `value` for `dimension`, replacing any previous choice.
    pub fn select(&mut self, dimension: DimensionId, value: impl Into<String>) {
        self.selected.insert(dimension, value.into());
    }

    /// Returns the selected value for `dimension`.
    #[must_use]
    pub fn get(&self, dimension: DimensionId) -> Option<&str> {
        self.selected.get(&dimension).map(String::as_str)
    }
}

/// Result of rendering a piece of content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderResult {
    /// The rendered text.
    pub rendered: String,

    /// Names that resolved to a node, in first-seen order.
    pub resolved: Vec<String>,

    /// Names left verbatim because nothing carries them.
    pub unresolved: Vec<String>,

    /// Whether expansion stopped at the depth limit somewhere.
    pub truncated: bool,
}

impl RenderResult {
    /// Returns true if every reference was expanded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty() && !self.truncated
    }

    fn note(list: &mut Vec<String>, name: &str) {
        if !list.iter().any(|n| n == name) {
            list.push(name.to_string());
        }
    }
}

/// Which spawn a container currently shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveSpawn<'a> {
    /// A spawn is selected (or defaulted to).
    Spawn(&'a StringNode),
    /// The `"Hidden"` value is selected.
    Hidden,
    /// The container has no spawns.
    None,
}

/// Renders content against a project snapshot.
pub struct ContentRenderer<'a> {
    project: &'a Project,
    index: NameIndex<'a>,
    selection: &'a DimensionSelection,
    max_depth: usize,
}

impl<'a> ContentRenderer<'a> {
    /// Creates a renderer with the default depth limit.
    #[must_use]
    pub fn new(project: &'a Project, selection: &'a DimensionSelection) -> Self {
        Self {
            project,
            index: NameIndex::new(&project.strings),
            selection,
            max_depth: DEFAULT_MAX_RENDER_DEPTH,
        }
    }

    /// Sets the depth limit.
    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Renders arbitrary content.
    #[must_use]
    pub fn render(&self, content: &str) -> RenderResult {
        let mut result = RenderResult::default();
        let rendered = self.expand(content, 0, &mut result);
        RenderResult { rendered, ..result }
    }

    /// Renders the node named `name`, or `None` if nothing carries it.
    #[must_use]
    pub fn render_node(&self, name: &str) -> Option<RenderResult> {
        let node = self.index.get(name)?;
        let mut result = RenderResult::default();
        let rendered = self.node_text(node, 0, &mut result);
        Some(RenderResult { rendered, ..result })
    }

    /// Returns the spawn a container shows under the current selection.
    #[must_use]
    pub fn active_spawn(&self, container: &StringNode) -> ActiveSpawn<'a> {
        let set = spawns_of(self.project, container);
        let selected = set.dimension.and_then(|d| self.selection.get(d.id));

        match selected {
            Some(HIDDEN_VALUE) => ActiveSpawn::Hidden,
            Some(value) => set
                .spawns
                .iter()
                .find(|s| s.effective_name() == value)
                .or_else(|| set.spawns.first())
                .map_or(ActiveSpawn::None, |s| ActiveSpawn::Spawn(*s)),
            None => set
                .spawns
                .first()
                .map_or(ActiveSpawn::None, |s| ActiveSpawn::Spawn(*s)),
        }
    }

    fn expand(&self, content: &str, depth: usize, result: &mut RenderResult) -> String {
        let references = parse_references(content);
        if references.is_empty() {
            return content.to_string();
        }

        let mut out = String::with_capacity(content.len());
        let mut last_end = 0;

        for reference in &references {
            out.push_str(&content[last_end..reference.span.start]);

            if let Some(node) = self.index.get(&reference.name) {
                RenderResult::note(&mut result.resolved, &reference.name);
                out.push_str(&self.node_text(node, depth + 1, result));
            } else {
                RenderResult::note(&mut result.unresolved, &reference.name);
                out.push_str(&content[reference.span.clone()]);
            }

            last_end = reference.span.end;
        }

        out.push_str(&content[last_end..]);
        out
    }

    fn node_text(&self, node: &StringNode, depth: usize, result: &mut RenderResult) -> String {
        if depth > self.max_depth {
            result.truncated = true;
            return format!("{{{{{}}}}}", node.effective_name());
        }

        if node.is_conditional_container {
            match self.active_spawn(node) {
                ActiveSpawn::Spawn(spawn) => self.node_text(spawn, depth + 1, result),
                ActiveSpawn::Hidden | ActiveSpawn::None => String::new(),
            }
        } else {
            self.expand(&node.content, depth, result)
        }
    }
}
