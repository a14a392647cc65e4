//! Spawn ordering.
//!
//! A container's spawns are the nodes holding any value of the dimension named
//! after the container. They are ordered by the integer after the last `_` of
//! their effective name (0 when there is none), ties broken by the name itself.

use std::cmp::Ordering;

use weft_domain::{Dimension, Project, StringNode};

/// A container's spawn dimension and its ordered spawns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnSet<'a> {
    /// The spawn dimension, if one exists.
    pub dimension: Option<&'a Dimension>,
    /// Spawns in display order.
    pub spawns: Vec<&'a StringNode>,
    /// Whether the dimension carries the `"Hidden"` value.
    pub has_hidden_option: bool,
}

impl SpawnSet<'_> {
    /// Returns the first spawn, the default selection.
    #[must_use]
    pub fn first(&self) -> Option<&StringNode> {
        self.spawns.first().copied()
    }

    /// Returns true if there are no spawns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spawns.is_empty()
    }
}

/// Returns the ordinal of a spawn name: the integer after its last `_`, or 0.
///
/// # Examples
///
/// ```
/// use weft_application::graph::spawn_ordinal;
///
/// assert_eq!(spawn_ordinal("greeting_12"), 12);
/// assert_eq!(spawn_ordinal("greeting"), 0);
/// assert_eq!(spawn_ordinal("greeting_x"), 0);
/// ```
#[must_use]
pub fn spawn_ordinal(name: &str) -> u64 {
    name.rsplit_once('_')
        .map(|(_, suffix)| suffix)
        .filter(|suffix| !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|suffix| suffix.parse().ok())
        .unwrap_or(0)
}

/// Display order of two spawns.
#[must_use]
pub fn compare_spawns(a: &StringNode, b: &StringNode) -> Ordering {
    let (a, b) = (a.effective_name(), b.effective_name());
    spawn_ordinal(a)
        .cmp(&spawn_ordinal(b))
        .then_with(|| a.cmp(b))
}

/// Collects and orders the spawns of the container named `container_name`.
#[must_use]
pub fn order_spawns<'a>(
    container_name: &str,
    nodes: &'a [StringNode],
    dimensions: &'a [Dimension],
) -> SpawnSet<'a> {
    let Some(dimension) = dimensions.iter().find(|d| d.name == container_name) else {
        return SpawnSet {
            dimension: None,
            spawns: Vec::new(),
            has_hidden_option: false,
        };
    };

    let mut spawns: Vec<&StringNode> = nodes
        .iter()
        .filter(|n| n.belongs_to_dimension(dimension.id))
        .collect();
    spawns.sort_by(|a, b| compare_spawns(a, b));

    SpawnSet {
        dimension: Some(dimension),
        spawns,
        has_hidden_option: dimension.has_hidden_value(),
    }
}

/// Collects and orders the spawns of `container` within `project`.
#[must_use]
pub fn spawns_of<'a>(project: &'a Project, container: &StringNode) -> SpawnSet<'a> {
    order_spawns(
        container.effective_name(),
        &project.strings,
        &project.dimensions,
    )
}
