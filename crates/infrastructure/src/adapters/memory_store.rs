//! In-process string store.
//!
//! Mirrors what the REST backend does on a save: hash generation, trimmed
//! content, effective-name uniqueness and the upkeep of a conditional's
//! dimension (one value per spawn, the optional `"Hidden"` value, orphan
//! removal). A save that fails part way leaves the project untouched.
//! Used by the CLI for offline snapshots and by the integration tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use rand::distr::Alphanumeric;
use tracing::debug;
use weft_application::ports::{NewNode, SaveNode, SpawnSet, StoreError, StringStore};
use weft_domain::{
    Dimension, DimensionId, DimensionValue, DimensionValueId, HIDDEN_VALUE, NodeDimensionValue,
    NodeId, Project, ProjectId, StringNode,
};

const HASH_LEN: usize = 8;

#[derive(Debug, Default)]
struct Inner {
    projects: HashMap<ProjectId, Project>,
    next_node: u64,
    next_dimension: u64,
    next_value: u64,
}

impl Inner {
    fn bump_counters(&mut self, project: &Project) {
        let max_node = project.strings.iter().map(|n| n.id.0).max().unwrap_or(0);
        let max_dimension = project.dimensions.iter().map(|d| d.id.0).max().unwrap_or(0);
        let max_value = project
            .dimensions
            .iter()
            .flat_map(|d| &d.values)
            .map(|v| v.id.0)
            .max()
            .unwrap_or(0);
        self.next_node = self.next_node.max(max_node + 1);
        self.next_dimension = self.next_dimension.max(max_dimension + 1);
        self.next_value = self.next_value.max(max_value + 1);
    }

    /// Copies one project and the id counters so a save can be applied to
    /// the copy and committed only when every step succeeded.
    fn scratch(&self, id: ProjectId) -> Result<Self, StoreError> {
        let project = self
            .projects
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("project {id}")))?;
        Ok(Self {
            projects: HashMap::from([(id, project)]),
            next_node: self.next_node,
            next_dimension: self.next_dimension,
            next_value: self.next_value,
        })
    }

    fn commit(&mut self, scratch: Self) {
        self.projects.extend(scratch.projects);
        self.next_node = scratch.next_node;
        self.next_dimension = scratch.next_dimension;
        self.next_value = scratch.next_value;
    }
}

/// A [`StringStore`] holding projects in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStringStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryStringStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with one project.
    #[must_use]
    pub fn with_project(project: Project) -> Self {
        let store = Self::new();
        store.insert_project(project);
        store
    }

    /// Adds or replaces a project. Ids handed out later never collide with
    /// the ones it already uses.
    pub fn insert_project(&self, project: Project) {
        let mut inner = self.lock();
        inner.bump_counters(&project);
        inner.projects.insert(project.id, project);
    }

    /// Returns a copy of a project.
    #[must_use]
    pub fn project(&self, id: ProjectId) -> Option<Project> {
        self.lock().projects.get(&id).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn project_mut(inner: &mut Inner, id: ProjectId) -> Result<&mut Project, StoreError> {
    inner
        .projects
        .get_mut(&id)
        .ok_or_else(|| StoreError::NotFound(format!("project {id}")))
}

fn generate_hash(project: &Project) -> String {
    let mut rng = rand::rng();
    loop {
        let hash: String = (&mut rng)
            .sample_iter(Alphanumeric)
            .take(HASH_LEN)
            .map(|b| char::from(b).to_ascii_lowercase())
            .collect();
        if !project.name_taken(&hash, None) {
            return hash;
        }
    }
}

fn check_name(project: &Project, name: Option<&str>, except: Option<NodeId>) -> Result<(), StoreError> {
    match name {
        Some(name) if project.name_taken(name, except) => Err(StoreError::Conflict(format!(
            "a variable named '{name}' already exists"
        ))),
        _ => Ok(()),
    }
}

fn insert_node(
    inner: &mut Inner,
    project_id: ProjectId,
    content: &str,
    name: Option<&str>,
    is_conditional: bool,
) -> Result<NodeId, StoreError> {
    let id = NodeId(inner.next_node);
    let project = project_mut(inner, project_id)?;
    check_name(project, name, None)?;

    let mut node = StringNode::new(id, generate_hash(project), content.trim());
    node.variable_name = name.map(str::to_string);
    node.is_conditional_container = is_conditional;
    node.created_at = Some(Utc::now());
    project.strings.push(node);

    inner.next_node += 1;
    debug!(node = %id, project = %project_id, "Node created");
    Ok(id)
}

fn update_node(
    project: &mut Project,
    id: NodeId,
    content: &str,
    name: Option<&str>,
    is_conditional: bool,
) -> Result<(), StoreError> {
    check_name(project, name, Some(id))?;
    let node = project
        .strings
        .iter_mut()
        .find(|n| n.id == id)
        .ok_or_else(|| StoreError::NotFound(format!("string {id}")))?;
    let old_name = node.effective_name().to_string();

    content.trim().clone_into(&mut node.content);
    node.variable_name = name.map(str::to_string);
    node.is_conditional_container = is_conditional;
    let new_name = node.effective_name().to_string();

    if old_name != new_name {
        rename_everywhere(project, &old_name, &new_name);
    }
    Ok(())
}

/// A container's dimension and a spawn's dimension values carry names; keep
/// them in step with a rename.
fn rename_everywhere(project: &mut Project, old: &str, new: &str) {
    for dimension in &mut project.dimensions {
        if dimension.name == old {
            new.clone_into(&mut dimension.name);
        }
        for value in &mut dimension.values {
            if value.value == old {
                new.clone_into(&mut value.value);
            }
        }
    }
    for node in &mut project.strings {
        for value in &mut node.dimension_values {
            if value.value == old {
                new.clone_into(&mut value.value);
            }
        }
    }
}

fn sync_dimension(
    inner: &mut Inner,
    project_id: ProjectId,
    container: NodeId,
    set: &SpawnSet,
) -> Result<(), StoreError> {
    // Spawns first: new ones need ids before they can be linked.
    let mut members = Vec::with_capacity(set.spawns.len());
    for spawn in &set.spawns {
        let id = match (spawn.target, spawn.link_only) {
            (Some(id), true) => {
                let project = project_mut(inner, project_id)?;
                if project.node(id).is_none() {
                    return Err(StoreError::NotFound(format!("string {id}")));
                }
                id
            }
            (Some(id), false) => {
                let project = project_mut(inner, project_id)?;
                update_node(project, id, &spawn.content, spawn.name.as_deref(), false)?;
                id
            }
            (None, _) => insert_node(inner, project_id, &spawn.content, spawn.name.as_deref(), false)?,
        };
        members.push(id);
    }

    let mut next_dimension = inner.next_dimension;
    let mut next_value = inner.next_value;
    let project = project_mut(inner, project_id)?;

    let container_name = project
        .node(container)
        .map(|n| n.effective_name().to_string())
        .ok_or_else(|| StoreError::NotFound(format!("string {container}")))?;
    let member_names: Vec<(NodeId, String)> = members
        .iter()
        .filter_map(|id| project.node(*id).map(|n| (*id, n.effective_name().to_string())))
        .collect();

    let position = if let Some(pos) = project.dimensions.iter().position(|d| d.name == container_name) {
        pos
    } else {
        project
            .dimensions
            .push(Dimension::new(DimensionId(next_dimension), container_name.clone()));
        next_dimension += 1;
        project.dimensions.len() - 1
    };
    let dimension = &mut project.dimensions[position];
    let dimension_id = dimension.id;

    // Orphans go, along with the links pointing at them.
    let mut removed = Vec::new();
    dimension.values.retain(|v| {
        let keep = v.is_hidden() || member_names.iter().any(|(_, name)| *name == v.value);
        if !keep {
            removed.push(v.id);
        }
        keep
    });

    let has_hidden = dimension.has_hidden_value();
    if set.include_hidden_option && !has_hidden {
        dimension
            .values
            .push(DimensionValue::new(DimensionValueId(next_value), HIDDEN_VALUE));
        next_value += 1;
    } else if !set.include_hidden_option && has_hidden {
        dimension.values.retain(|v| {
            if v.is_hidden() {
                removed.push(v.id);
            }
            !v.is_hidden()
        });
    }

    let mut links = Vec::with_capacity(member_names.len());
    for (id, name) in &member_names {
        let value_id = if let Some(existing) = dimension.value_named(name) {
            existing.id
        } else {
            let value_id = DimensionValueId(next_value);
            next_value += 1;
            dimension.values.push(DimensionValue::new(value_id, name.clone()));
            value_id
        };
        links.push((*id, value_id, name.clone()));
    }

    for node in &mut project.strings {
        node.dimension_values
            .retain(|v| !removed.contains(&v.dimension_value));
    }
    for (id, value_id, name) in links {
        if let Some(node) = project.strings.iter_mut().find(|n| n.id == id)
            && !node.dimension_values.iter().any(|v| v.dimension_value == value_id)
        {
            node.dimension_values.push(NodeDimensionValue {
                dimension_value: value_id,
                dimension: dimension_id,
                value: name,
            });
        }
    }

    debug!(
        dimension = %dimension_id,
        spawns = members.len(),
        removed = removed.len(),
        "Dimension synced"
    );
    inner.next_dimension = next_dimension;
    inner.next_value = next_value;
    Ok(())
}

#[async_trait]
impl StringStore for InMemoryStringStore {
    async fn create_node(&self, project: ProjectId, node: NewNode) -> Result<NodeId, StoreError> {
        let mut inner = self.lock();
        insert_node(
            &mut inner,
            project,
            &node.content,
            node.name.as_deref(),
            node.is_conditional,
        )
    }

    async fn save_node(&self, project: ProjectId, save: SaveNode) -> Result<NodeId, StoreError> {
        let mut inner = self.lock();
        let mut scratch = inner.scratch(project)?;
        let id = match save.target {
            Some(id) => {
                let target = project_mut(&mut scratch, project)?;
                update_node(target, id, &save.content, save.name.as_deref(), save.is_conditional)?;
                id
            }
            None => insert_node(
                &mut scratch,
                project,
                &save.content,
                save.name.as_deref(),
                save.is_conditional,
            )?,
        };

        if let Some(set) = &save.spawns {
            sync_dimension(&mut scratch, project, id, set)?;
        }
        inner.commit(scratch);
        Ok(id)
    }

    async fn fetch_project(&self, project: ProjectId) -> Result<Project, StoreError> {
        self.project(project)
            .ok_or_else(|| StoreError::NotFound(format!("project {project}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use weft_application::graph::spawns_of;
    use weft_application::ports::SpawnSave;

    fn seeded() -> InMemoryStringStore {
        InMemoryStringStore::with_project(
            Project::new(ProjectId(1), "demo")
                .with_node(StringNode::new(NodeId(10), "u1", "friend").with_name("user")),
        )
    }

    fn spawn(content: &str, name: Option<&str>) -> SpawnSave {
        SpawnSave {
            target: None,
            content: content.to_string(),
            name: name.map(str::to_string),
            link_only: false,
        }
    }

    fn conditional(target: Option<NodeId>, spawns: Vec<SpawnSave>, hidden: bool) -> SaveNode {
        SaveNode {
            target,
            content: String::new(),
            name: Some("tier".to_string()),
            is_conditional: true,
            spawns: Some(SpawnSet {
                spawns,
                include_hidden_option: hidden,
            }),
        }
    }

    #[tokio::test]
    async fn test_create_assigns_fresh_id_and_hash() {
        let store = seeded();
        let id = store
            .create_node(ProjectId(1), NewNode {
                content: "x".to_string(),
                name: None,
                is_conditional: false,
            })
            .await
            .unwrap();

        assert_eq!(id, NodeId(11));
        let project = store.fetch_project(ProjectId(1)).await.unwrap();
        let node = project.node(id).unwrap();
        assert_eq!(node.variable_hash.len(), HASH_LEN);
        assert_eq!(node.effective_name(), node.variable_hash);
        assert!(node.created_at.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_names_conflict() {
        let store = seeded();
        let result = store
            .create_node(ProjectId(1), NewNode {
                content: "again".to_string(),
                name: Some("user".to_string()),
                is_conditional: false,
            })
            .await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_failed_conditional_save_leaves_project_untouched() {
        let store = seeded();
        let before = store.project(ProjectId(1)).unwrap();

        let clash = conditional(None, vec![spawn("Free", Some("user"))], true);
        assert!(matches!(
            store.save_node(ProjectId(1), clash).await,
            Err(StoreError::Conflict(_))
        ));
        assert_eq!(store.project(ProjectId(1)).unwrap(), before);

        let id = store
            .save_node(
                ProjectId(1),
                conditional(None, vec![spawn("Free", Some("tier_1"))], true),
            )
            .await
            .unwrap();
        assert_eq!(id, NodeId(11));
        let project = store.fetch_project(ProjectId(1)).await.unwrap();
        assert_eq!(project.node_named("tier").unwrap().id, id);
        assert_eq!(project.node_named("tier_1").unwrap().id, NodeId(12));
    }

    #[tokio::test]
    async fn test_content_is_trimmed_on_save() {
        let store = seeded();
        let id = store
            .save_node(
                ProjectId(1),
                conditional(None, vec![spawn("  Free \n", Some("tier_1"))], false),
            )
            .await
            .unwrap();
        let save = SaveNode {
            target: Some(NodeId(10)),
            content: " pal ".to_string(),
            name: Some("user".to_string()),
            is_conditional: false,
            spawns: None,
        };
        store.save_node(ProjectId(1), save).await.unwrap();

        let project = store.fetch_project(ProjectId(1)).await.unwrap();
        assert_eq!(project.node(NodeId(10)).unwrap().content, "pal");
        let set = spawns_of(&project, project.node(id).unwrap());
        assert_eq!(set.spawns[0].content, "Free");
    }

    #[tokio::test]
    async fn test_unknown_project_and_node() {
        let store = seeded();
        assert!(matches!(
            store.fetch_project(ProjectId(2)).await,
            Err(StoreError::NotFound(_))
        ));
        let save = SaveNode {
            target: Some(NodeId(99)),
            content: "x".to_string(),
            name: None,
            is_conditional: false,
            spawns: None,
        };
        assert!(matches!(
            store.save_node(ProjectId(1), save).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_conditional_save_builds_dimension() {
        let store = seeded();
        let id = store
            .save_node(
                ProjectId(1),
                conditional(
                    None,
                    vec![spawn("Free", Some("tier_1")), spawn("Pro", Some("tier_2"))],
                    true,
                ),
            )
            .await
            .unwrap();

        let project = store.fetch_project(ProjectId(1)).await.unwrap();
        let dimension = project.dimension_named("tier").unwrap();
        assert_eq!(dimension.values.len(), 3);
        assert!(dimension.has_hidden_value());

        let set = spawns_of(&project, project.node(id).unwrap());
        let contents: Vec<_> = set.spawns.iter().map(|s| s.content.as_str()).collect();
        assert_eq!(contents, vec!["Free", "Pro"]);
        assert!(set.has_hidden_option);
    }

    #[tokio::test]
    async fn test_resave_removes_orphans_and_hidden() {
        let store = seeded();
        let id = store
            .save_node(
                ProjectId(1),
                conditional(
                    None,
                    vec![spawn("Free", Some("tier_1")), spawn("Pro", Some("tier_2"))],
                    true,
                ),
            )
            .await
            .unwrap();
        let project = store.fetch_project(ProjectId(1)).await.unwrap();
        let pro = project.node_named("tier_2").unwrap().id;

        let kept = SpawnSave {
            target: Some(pro),
            content: "Pro plus".to_string(),
            name: Some("tier_2".to_string()),
            link_only: false,
        };
        store
            .save_node(ProjectId(1), conditional(Some(id), vec![kept], false))
            .await
            .unwrap();

        let project = store.fetch_project(ProjectId(1)).await.unwrap();
        let dimension = project.dimension_named("tier").unwrap();
        let values: Vec<_> = dimension.values.iter().map(|v| v.value.as_str()).collect();
        assert_eq!(values, vec!["tier_2"]);
        assert!(project.node_named("tier_1").unwrap().dimension_values.is_empty());

        let set = spawns_of(&project, project.node(id).unwrap());
        assert_eq!(set.spawns.len(), 1);
        assert_eq!(set.spawns[0].content, "Pro plus");
        assert!(!set.has_hidden_option);
    }

    #[tokio::test]
    async fn test_link_only_spawn_is_linked_not_saved() {
        let store = seeded();
        let linked = SpawnSave {
            target: Some(NodeId(10)),
            content: "ignored".to_string(),
            name: Some("user".to_string()),
            link_only: true,
        };
        let id = store
            .save_node(ProjectId(1), conditional(None, vec![linked], false))
            .await
            .unwrap();

        let project = store.fetch_project(ProjectId(1)).await.unwrap();
        let set = spawns_of(&project, project.node(id).unwrap());
        assert_eq!(set.spawns.len(), 1);
        assert_eq!(set.spawns[0].content, "friend");
    }

    #[tokio::test]
    async fn test_renaming_container_renames_its_dimension() {
        let store = seeded();
        let id = store
            .save_node(ProjectId(1), conditional(None, vec![spawn("A", None)], false))
            .await
            .unwrap();

        let mut rename = conditional(Some(id), Vec::new(), false);
        rename.name = Some("plan".to_string());
        rename.spawns = None;
        store.save_node(ProjectId(1), rename).await.unwrap();

        let project = store.fetch_project(ProjectId(1)).await.unwrap();
        assert!(project.dimension_named("tier").is_none());
        let set = spawns_of(&project, project.node(id).unwrap());
        assert_eq!(set.spawns.len(), 1);
    }
}
