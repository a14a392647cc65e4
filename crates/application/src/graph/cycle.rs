//! Cycle detection over the reference graph.
//!
//! Vertices are the project's nodes plus the node being saved (and any new
//! spawns it brings). Edges are:
//!
//! - `a -> b` when `a`'s content references `b` by effective name;
//! - `c -> s` when `c` is a conditional container and `s` is one of its spawns.
//!
//! The node being saved replaces its stored counterpart: its name, content and
//! spawn list are the candidate's, not the snapshot's. Only cycles through the
//! candidate are reported, and the search is linear in vertices plus edges.

use std::collections::HashMap;
use std::fmt;

use weft_domain::{Dimension, DimensionId, Draft, NodeId, Project, StringNode};

use super::spawns::spawns_of;
use crate::variable_resolver::extract_references;

const UNNAMED: &str = "<unnamed>";

/// An ordered list of names whose first and last element are equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CyclePath(pub Vec<String>);

impl CyclePath {
    /// Returns the names along the cycle.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for CyclePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(" -> "))
    }
}

/// A spawn of the node being saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateSpawn {
    /// The persisted spawn, if any.
    pub node_id: Option<NodeId>,
    /// Effective name, if one is known yet.
    pub name: Option<String>,
    /// Content as it will be saved.
    pub content: String,
}

/// The node being saved, as it will look after the save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleCandidate {
    /// The persisted node it replaces, if any.
    pub node_id: Option<NodeId>,
    /// Effective name, if one is known yet.
    pub name: Option<String>,
    /// Content as it will be saved.
    pub content: String,
    /// Whether it will be a conditional container.
    pub is_conditional: bool,
    /// Full spawn list after the save (ignored unless conditional).
    pub spawns: Vec<CandidateSpawn>,
}

impl CycleCandidate {
    /// Creates a plain candidate.
    #[must_use]
    pub fn new(node_id: Option<NodeId>, name: Option<String>, content: impl Into<String>) -> Self {
        Self {
            node_id,
            name,
            content: content.into(),
            is_conditional: false,
            spawns: Vec::new(),
        }
    }

    /// Builds a candidate from a draft.
    #[must_use]
    pub fn from_draft(draft: &Draft) -> Self {
        let spawns = if draft.is_conditional {
            draft
                .conditional_spawns
                .iter()
                .map(|spawn| CandidateSpawn {
                    node_id: spawn.node_id,
                    name: spawn.effective_name().map(str::to_string),
                    content: spawn.content.clone(),
                })
                .collect()
        } else {
            Vec::new()
        };

        Self {
            node_id: draft.node_id,
            name: draft.effective_name().map(str::to_string),
            content: draft.content.clone(),
            is_conditional: draft.is_conditional,
            spawns,
        }
    }

    /// Builds a candidate that re-saves a stored node unchanged.
    ///
    /// Checking it finds the cycles already present in the snapshot through
    /// that node.
    #[must_use]
    pub fn from_stored(project: &Project, node: &StringNode) -> Self {
        let spawns = if node.is_conditional_container {
            spawns_of(project, node)
                .spawns
                .into_iter()
                .map(|spawn| CandidateSpawn {
                    node_id: Some(spawn.id),
                    name: Some(spawn.effective_name().to_string()),
                    content: spawn.content.clone(),
                })
                .collect()
        } else {
            Vec::new()
        };

        Self {
            node_id: Some(node.id),
            name: Some(node.effective_name().to_string()),
            content: node.content.clone(),
            is_conditional: node.is_conditional_container,
            spawns,
        }
    }
}

/// Returns true if saving `candidate` would close a reference cycle.
#[must_use]
pub fn would_cycle(candidate: &CycleCandidate, nodes: &[StringNode], dimensions: &[Dimension]) -> bool {
    find_cycle(candidate, nodes, dimensions).is_some()
}

/// Finds a cycle through `candidate`, if saving it would create one.
///
/// The returned path starts and ends at the candidate.
#[must_use]
pub fn find_cycle(
    candidate: &CycleCandidate,
    nodes: &[StringNode],
    dimensions: &[Dimension],
) -> Option<CyclePath> {
    let graph = ReferenceGraph::build(candidate, nodes, dimensions);
    graph.cycle_through(graph.root)
}

struct Vertex<'a> {
    name: Option<&'a str>,
    content: &'a str,
}

struct ReferenceGraph<'a> {
    vertices: Vec<Vertex<'a>>,
    edges: Vec<Vec<usize>>,
    root: usize,
}

impl<'a> ReferenceGraph<'a> {
    fn build(candidate: &'a CycleCandidate, nodes: &'a [StringNode], dimensions: &'a [Dimension]) -> Self {
        let mut vertices: Vec<Vertex<'a>> = nodes
            .iter()
            .map(|n| Vertex {
                name: Some(n.effective_name()),
                content: &n.content,
            })
            .collect();
        let by_id: HashMap<NodeId, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id, i))
            .collect();

        let mut place = |node_id: Option<NodeId>, name: Option<&'a str>, content: &'a str| {
            let vertex = Vertex { name, content };
            if let Some(&i) = node_id.and_then(|id| by_id.get(&id)) {
                vertices[i] = vertex;
                i
            } else {
                vertices.push(vertex);
                vertices.len() - 1
            }
        };

        let root = place(
            candidate.node_id,
            candidate.name.as_deref(),
            candidate.content.as_str(),
        );
        let candidate_spawns: Vec<usize> = if candidate.is_conditional {
            candidate
                .spawns
                .iter()
                .map(|s| place(s.node_id, s.name.as_deref(), s.content.as_str()))
                .collect()
        } else {
            Vec::new()
        };

        let mut edges = vec![Vec::new(); vertices.len()];

        // Membership edges of stored containers, keyed by their stored name.
        let stored_containers: HashMap<&str, usize> = nodes
            .iter()
            .enumerate()
            .filter(|(i, n)| n.is_conditional_container && *i != root)
            .map(|(i, n)| (n.effective_name(), i))
            .collect();
        let container_of: HashMap<DimensionId, usize> = dimensions
            .iter()
            .filter_map(|d| stored_containers.get(d.name.as_str()).map(|&c| (d.id, c)))
            .collect();
        for (i, node) in nodes.iter().enumerate() {
            for dv in &node.dimension_values {
                if let Some(&container) = container_of.get(&dv.dimension) {
                    edges[container].push(i);
                }
            }
        }
        edges[root].extend(candidate_spawns.iter().copied());

        // Reference edges, resolved against the names after the save.
        let mut by_name: HashMap<&str, usize> = HashMap::with_capacity(vertices.len());
        for (i, vertex) in vertices.iter().enumerate() {
            if let Some(name) = vertex.name {
                by_name.entry(name).or_insert(i);
            }
        }
        // the candidate and its spawns win over snapshot entries of the same name
        for &i in std::iter::once(&root).chain(&candidate_spawns) {
            if let Some(name) = vertices[i].name {
                by_name.insert(name, i);
            }
        }
        for (i, vertex) in vertices.iter().enumerate() {
            for name in extract_references(vertex.content) {
                if let Some(&target) = by_name.get(name.as_str()) {
                    edges[i].push(target);
                }
            }
        }

        Self {
            vertices,
            edges,
            root,
        }
    }

    fn name(&self, vertex: usize) -> String {
        self.vertices[vertex].name.unwrap_or(UNNAMED).to_string()
    }

    /// Iterative depth-first search for an edge leading back to `start`.
    fn cycle_through(&self, start: usize) -> Option<CyclePath> {
        let mut visited = vec![false; self.vertices.len()];
        let mut parent: Vec<Option<usize>> = vec![None; self.vertices.len()];
        let mut stack = vec![(start, 0usize)];
        visited[start] = true;

        while let Some((vertex, next_edge)) = stack.last_mut() {
            let vertex = *vertex;
            let Some(&target) = self.edges[vertex].get(*next_edge) else {
                stack.pop();
                continue;
            };
            *next_edge += 1;

            if target == start {
                let mut path = vec![self.name(start)];
                let mut chain = vec![vertex];
                let mut current = vertex;
                while let Some(p) = parent[current] {
                    chain.push(p);
                    current = p;
                }
                // chain runs vertex -> ... -> start; drop start, it opens the path
                chain.pop();
                path.extend(chain.into_iter().rev().map(|v| self.name(v)));
                path.push(self.name(start));
                return Some(CyclePath(path));
            }

            if !visited[target] {
                visited[target] = true;
                parent[target] = Some(vertex);
                stack.push((target, 0));
            }
        }

        None
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use weft_domain::{DimensionValueId, NodeDimensionValue};

    fn node(id: u64, name: &str, content: &str) -> StringNode {
        StringNode::new(NodeId(id), format!("h{id}"), content).with_name(name)
    }

    fn member(node: StringNode, dimension: u64) -> StringNode {
        let value = node.effective_name().to_string();
        let id = node.id.0;
        node.with_dimension_value(NodeDimensionValue {
            dimension_value: DimensionValueId(id),
            dimension: DimensionId(dimension),
            value,
        })
    }

    fn path(names: &[&str]) -> CyclePath {
        CyclePath(names.iter().map(|s| (*s).to_string()).collect())
    }

    #[test]
    fn test_no_cycle_in_acyclic_graph() {
        let nodes = vec![node(1, "a", "{{b}}"), node(2, "b", "{{c}}"), node(3, "c", "end")];
        let candidate = CycleCandidate::new(Some(NodeId(1)), Some("a".into()), "{{b}} {{c}}");
        assert!(!would_cycle(&candidate, &nodes, &[]));
    }

    #[test]
    fn test_two_node_cycle_reports_path() {
        let nodes = vec![node(1, "A", "{{B}}"), node(2, "B", "text")];
        let candidate = CycleCandidate::new(Some(NodeId(2)), Some("B".into()), "{{A}}");
        assert_eq!(find_cycle(&candidate, &nodes, &[]), Some(path(&["B", "A", "B"])));
    }

    #[test]
    fn test_self_reference() {
        let nodes = vec![node(1, "A", "x")];
        let candidate = CycleCandidate::new(Some(NodeId(1)), Some("A".into()), "again {{A}}");
        assert_eq!(find_cycle(&candidate, &nodes, &[]), Some(path(&["A", "A"])));
    }

    #[test]
    fn test_candidate_content_replaces_stored_content() {
        // stored A points at B which points back, but the edit removes the reference
        let nodes = vec![node(1, "A", "{{B}}"), node(2, "B", "{{A}}")];
        let candidate = CycleCandidate::new(Some(NodeId(1)), Some("A".into()), "plain");
        assert!(!would_cycle(&candidate, &nodes, &[]));
    }

    #[test]
    fn test_new_node_cycle_through_its_new_name() {
        let nodes = vec![node(1, "A", "{{fresh}}")];
        let candidate = CycleCandidate::new(None, Some("fresh".into()), "{{A}}");
        assert_eq!(
            find_cycle(&candidate, &nodes, &[]),
            Some(path(&["fresh", "A", "fresh"]))
        );
    }

    #[test]
    fn test_rename_breaks_old_cycle() {
        let nodes = vec![node(1, "A", "{{B}}"), node(2, "B", "x")];
        // B is renamed to C; A still references the old name
        let candidate = CycleCandidate::new(Some(NodeId(2)), Some("C".into()), "{{A}}");
        assert!(!would_cycle(&candidate, &nodes, &[]));
    }

    #[test]
    fn test_unknown_references_are_ignored() {
        let candidate = CycleCandidate::new(None, Some("x".into()), "{{nobody}}");
        assert!(!would_cycle(&candidate, &[], &[]));
    }

    #[test]
    fn test_spawn_referencing_outer_variable_that_uses_container() {
        // page uses cond; cond's new spawn references page
        let nodes = vec![node(1, "page", "Top {{cond}}")];
        let candidate = CycleCandidate {
            node_id: None,
            name: Some("cond".into()),
            content: String::new(),
            is_conditional: true,
            spawns: vec![CandidateSpawn {
                node_id: None,
                name: None,
                content: "see {{page}}".into(),
            }],
        };
        assert_eq!(
            find_cycle(&candidate, &nodes, &[]),
            Some(path(&["cond", UNNAMED, "page", "cond"]))
        );
    }

    #[test]
    fn test_spawn_referencing_its_container() {
        let candidate = CycleCandidate {
            node_id: None,
            name: Some("cond".into()),
            content: String::new(),
            is_conditional: true,
            spawns: vec![CandidateSpawn {
                node_id: None,
                name: Some("cond_1".into()),
                content: "{{cond}}".into(),
            }],
        };
        assert_eq!(
            find_cycle(&candidate, &[], &[]),
            Some(path(&["cond", "cond_1", "cond"]))
        );
    }

    #[test]
    fn test_stored_container_membership_edges() {
        // editing X to reference cond, whose stored spawn references X
        let nodes = vec![
            node(1, "cond", "").conditional(),
            member(node(2, "cond_1", "{{X}}"), 5),
            node(3, "X", "x"),
        ];
        let dims = vec![Dimension::new(DimensionId(5), "cond")];
        let candidate = CycleCandidate::new(Some(NodeId(3)), Some("X".into()), "{{cond}}");
        assert_eq!(
            find_cycle(&candidate, &nodes, &dims),
            Some(path(&["X", "cond", "cond_1", "X"]))
        );
    }

    #[test]
    fn test_candidate_spawn_list_replaces_stored_membership() {
        // the stored spawn cond_1 references X, but the edit drops it from the list
        let nodes = vec![
            node(1, "cond", "").conditional(),
            member(node(2, "cond_1", "{{X}}"), 5),
            node(3, "X", "{{cond}}"),
        ];
        let dims = vec![Dimension::new(DimensionId(5), "cond")];
        let candidate = CycleCandidate {
            node_id: Some(NodeId(1)),
            name: Some("cond".into()),
            content: String::new(),
            is_conditional: true,
            spawns: vec![CandidateSpawn {
                node_id: None,
                name: Some("cond_2".into()),
                content: "safe".into(),
            }],
        };
        assert!(!would_cycle(&candidate, &nodes, &dims));
    }

    #[test]
    fn test_cycle_not_through_candidate_is_not_reported() {
        let nodes = vec![node(1, "A", "{{B}}"), node(2, "B", "{{A}}")];
        let candidate = CycleCandidate::new(None, Some("C".into()), "{{A}}");
        assert!(!would_cycle(&candidate, &nodes, &[]));
    }

    #[test]
    fn test_long_chain_is_handled_iteratively() {
        let nodes: Vec<StringNode> = (0..5_000)
            .map(|i| node(i, &format!("n{i}"), &format!("{{{{n{}}}}}", i + 1)))
            .collect();
        let candidate = CycleCandidate::new(None, Some("n5000".into()), "{{n0}}");
        let cycle = find_cycle(&candidate, &nodes, &[]).unwrap_or_else(|| CyclePath(Vec::new()));
        assert_eq!(cycle.names().len(), 5_002);
        assert_eq!(cycle.names().first(), cycle.names().last());
    }

    #[test]
    fn test_from_draft_uses_spawns_only_when_conditional() {
        let mut draft = Draft::new_conditional("", "spawn {{x}}");
        draft.set_variable_name("cond");
        let candidate = CycleCandidate::from_draft(&draft);
        assert_eq!(candidate.spawns.len(), 1);
        assert_eq!(candidate.name.as_deref(), Some("cond"));

        draft.set_conditional(false, "");
        assert!(CycleCandidate::from_draft(&draft).spawns.is_empty());
    }

    #[test]
    fn test_stored_cycle_through_spawn() {
        let project = Project::new(weft_domain::ProjectId(1), "p")
            .with_node(node(1, "tone", "").conditional())
            .with_node(member(node(2, "tone_1", "{{page}}"), 9))
            .with_node(node(3, "page", "Hi {{tone}}"))
            .with_dimension(Dimension::new(DimensionId(9), "tone"));

        let container = project.node(NodeId(1)).unwrap();
        let candidate = CycleCandidate::from_stored(&project, container);
        assert_eq!(candidate.spawns.len(), 1);
        assert_eq!(
            find_cycle(&candidate, &project.strings, &project.dimensions),
            Some(path(&["tone", "tone_1", "page", "tone"]))
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(path(&["a", "b", "a"]).to_string(), "a -> b -> a");
    }
}
