//! Commit draft use case
//!
//! Runs the commit pipeline of one editor frame, in order: reference
//! discovery, materialization of names nothing carries yet, validation and
//! cycle check, persist, refresh. The first hard failure aborts the pipeline;
//! materialization failures and a failed refresh are reported but do not.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};
use weft_domain::{CommitErrorKind, Draft, EditorSettings, NodeId, Project, StringNode};

use crate::graph::{CycleCandidate, CyclePath, find_cycle};
use crate::ports::{NewNode, ProjectSink, SaveNode, SpawnSave, SpawnSet, StoreError, StringStore, non_empty};
use crate::variable_resolver::{NameResolver, PendingVariables, Resolution, extract_references};

/// Errors that abort a commit. The draft is kept in every case.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommitError {
    /// Saving would close a reference cycle.
    #[error("Circular reference: {0}")]
    CircularReference(CyclePath),

    /// The store failed the save.
    #[error("Failed to save: {0}")]
    Persistence(#[from] StoreError),

    /// The name is already used by another variable.
    #[error("Variable name '{0}' is already in use")]
    DuplicateName(String),

    /// Some spawns of a conditional have no content.
    #[error("All spawns must have content ({0} empty)")]
    EmptySpawns(usize),
}

impl CommitError {
    /// Returns the display category.
    #[must_use]
    pub const fn kind(&self) -> CommitErrorKind {
        match self {
            Self::CircularReference(_) => CommitErrorKind::CircularReference,
            Self::Persistence(_) => CommitErrorKind::Persistence,
            Self::DuplicateName(_) | Self::EmptySpawns(_) => CommitErrorKind::Validation,
        }
    }

    /// Returns technical details worth showing next to the message.
    #[must_use]
    pub fn details(&self) -> Option<String> {
        match self {
            Self::CircularReference(path) => Some(path.to_string()),
            _ => None,
        }
    }
}

/// A referenced name that could not be created. The commit went on without it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Could not create variable '{name}': {source}")]
pub struct MaterializationFailure {
    /// The referenced name.
    pub name: String,
    /// Why the store refused.
    pub source: StoreError,
}

/// The save went through but the project could not be reloaded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Saved, but the project could not be refreshed: {source}")]
pub struct RefreshFailure {
    /// Why the reload failed.
    pub source: StoreError,
}

/// A variable created because the committed content referenced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedNode {
    /// Its name.
    pub name: String,
    /// Its new id.
    pub node_id: NodeId,
    /// The content it was created with.
    pub content: String,
    /// Whether it was created as a conditional container.
    pub is_conditional: bool,
}

/// Everything the commit pipeline needs from a frame.
#[derive(Debug, Clone)]
pub struct CommitRequest {
    /// Snapshot the frame was opened against.
    pub project: Arc<Project>,
    /// The draft to commit.
    pub draft: Draft,
    /// Variables introduced by the frame but not persisted yet.
    pub pending: PendingVariables,
}

/// Result of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    /// Id of the saved node.
    pub node_id: NodeId,
    /// The draft as it was saved.
    pub draft: Draft,
    /// Variables created on the way.
    pub materialized: Vec<MaterializedNode>,
    /// Variables that could not be created.
    pub skipped: Vec<MaterializationFailure>,
    /// The refreshed snapshot, when the reload worked.
    pub project: Option<Project>,
    /// Why the reload did not work.
    pub refresh_failure: Option<RefreshFailure>,
}

impl CommitOutcome {
    /// Returns true if something went wrong that did not stop the commit.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.skipped.is_empty() || self.refresh_failure.is_some()
    }
}

/// Commits a frame's draft through the store.
pub struct CommitDraft<S, P> {
    store: S,
    sink: P,
    materialized_content: String,
    empty_content_fallback: String,
}

impl<S: StringStore, P: ProjectSink> CommitDraft<S, P> {
    /// Creates a new `CommitDraft` use case with default settings.
    pub fn new(store: S, sink: P) -> Self {
        let defaults = EditorSettings::default();
        Self {
            store,
            sink,
            materialized_content: defaults.materialized_content,
            empty_content_fallback: defaults.empty_content_fallback,
        }
    }

    /// Applies the content defaults from `settings`.
    #[must_use]
    pub fn with_settings(mut self, settings: &EditorSettings) -> Self {
        self.materialized_content.clone_from(&settings.materialized_content);
        self.empty_content_fallback.clone_from(&settings.empty_content_fallback);
        self
    }

    /// Returns the store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Executes the use case.
    ///
    /// # Errors
    /// Returns a `CommitError` when validation, the cycle check or the save
    /// fails. Nothing after the failing step runs.
    pub async fn execute(&self, request: &CommitRequest) -> Result<CommitOutcome, CommitError> {
        let project = request.project.as_ref();
        let mut draft = self.finalize(&request.draft);
        debug!(key = %draft.key, project = %project.id, "Committing draft");

        validate(project, &draft)?;

        let discovered = discover(&draft);
        debug!(count = discovered.len(), "Discovered references");

        let (materialized, skipped) = self
            .materialize(project, &draft, &request.pending, &discovered)
            .await;

        let mut nodes = project.strings.clone();
        nodes.extend(materialized.iter().map(|m| {
            let node = StringNode::new(m.node_id, m.name.clone(), m.content.clone());
            if m.is_conditional { node.conditional() } else { node }
        }));
        if let Some(path) = find_cycle(&CycleCandidate::from_draft(&draft), &nodes, &project.dimensions) {
            warn!(cycle = %path, "Commit rejected");
            return Err(CommitError::CircularReference(path));
        }

        let node_id = self.store.save_node(project.id, save_request(&draft)).await?;
        info!(node = %node_id, "Draft saved");

        let (refreshed, refresh_failure) = match self.store.fetch_project(project.id).await {
            Ok(fresh) => {
                self.sink.on_project_updated(&fresh);
                (Some(fresh), None)
            }
            Err(source) => {
                warn!(error = %source, "Project refresh failed; the save stands");
                (None, Some(RefreshFailure { source }))
            }
        };

        draft.key = node_id.to_string();
        draft.node_id = Some(node_id);
        draft.temporary = false;
        draft.dirty = false;
        if let Some(node) = refreshed.as_ref().and_then(|p| p.node(node_id)) {
            draft.variable_hash = Some(node.variable_hash.clone());
        }

        Ok(CommitOutcome {
            node_id,
            draft,
            materialized,
            skipped,
            project: refreshed,
            refresh_failure,
        })
    }

    /// Applies the blank-content fallback.
    fn finalize(&self, draft: &Draft) -> Draft {
        let mut draft = draft.clone();
        if !draft.is_conditional && draft.content.trim().is_empty() {
            draft.content = non_empty(&draft.variable_name)
                .unwrap_or_else(|| self.empty_content_fallback.clone());
        }
        draft
    }

    async fn materialize(
        &self,
        project: &Project,
        draft: &Draft,
        pending: &PendingVariables,
        discovered: &[String],
    ) -> (Vec<MaterializedNode>, Vec<MaterializationFailure>) {
        let own_names: HashSet<&str> = std::iter::once(draft)
            .chain(&draft.conditional_spawns)
            .filter_map(Draft::effective_name)
            .collect();
        let resolver = NameResolver::new(&project.strings, pending);

        let mut materialized = Vec::new();
        let mut skipped = Vec::new();

        for name in discovered {
            if own_names.contains(name.as_str()) {
                continue;
            }
            let node = match resolver.resolve(name) {
                Resolution::Found(_) => continue,
                Resolution::Pending(variable) => NewNode {
                    content: variable.content.clone(),
                    name: Some(name.clone()),
                    is_conditional: variable.is_conditional,
                },
                Resolution::Unknown => NewNode {
                    content: self.materialized_content.clone(),
                    name: Some(name.clone()),
                    is_conditional: false,
                },
            };

            let (content, is_conditional) = (node.content.clone(), node.is_conditional);
            match self.store.create_node(project.id, node).await {
                Ok(node_id) => {
                    debug!(name = %name, node = %node_id, "Materialized variable");
                    materialized.push(MaterializedNode {
                        name: name.clone(),
                        node_id,
                        content,
                        is_conditional,
                    });
                }
                Err(source) => {
                    warn!(name = %name, error = %source, "Skipping variable that could not be created");
                    skipped.push(MaterializationFailure {
                        name: name.clone(),
                        source,
                    });
                }
            }
        }

        (materialized, skipped)
    }
}

/// Rejects drafts that must never reach the store.
fn validate(project: &Project, draft: &Draft) -> Result<(), CommitError> {
    let spawns = saved_spawns(draft);

    let empty = spawns
        .iter()
        .filter(|s| !s.link_only && s.content.trim().is_empty())
        .count();
    if empty > 0 {
        return Err(CommitError::EmptySpawns(empty));
    }

    let mut claimed: HashSet<String> = spawns
        .iter()
        .filter(|s| s.link_only)
        .filter_map(|s| s.effective_name().map(str::to_string))
        .collect();
    for candidate in std::iter::once(draft).chain(spawns.iter().filter(|s| !s.link_only)) {
        let Some(name) = non_empty(&candidate.variable_name) else {
            continue;
        };
        if project.name_taken(&name, candidate.node_id) || !claimed.insert(name.clone()) {
            return Err(CommitError::DuplicateName(name));
        }
    }

    Ok(())
}

/// Distinct names referenced by the draft and the spawns it will save.
fn discover(draft: &Draft) -> Vec<String> {
    let mut seen = HashSet::new();
    let contents = std::iter::once(&draft.content).chain(
        saved_spawns(draft)
            .iter()
            .filter(|s| !s.link_only)
            .map(|s| &s.content),
    );

    contents
        .flat_map(|content| extract_references(content))
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

fn saved_spawns(draft: &Draft) -> &[Draft] {
    if draft.is_conditional {
        &draft.conditional_spawns
    } else {
        &[]
    }
}

fn save_request(draft: &Draft) -> SaveNode {
    SaveNode {
        target: draft.node_id,
        content: draft.content.clone(),
        name: non_empty(&draft.variable_name),
        is_conditional: draft.is_conditional,
        spawns: draft.is_conditional.then(|| SpawnSet {
            spawns: draft.conditional_spawns.iter().map(SpawnSave::from_draft).collect(),
            include_hidden_option: draft.include_hidden_option,
        }),
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::significant_drop_tightening
)]
mod tests {
    use super::*;
    use crate::test_support::{MockStore, StoreCall, recording_sink};
    use crate::variable_resolver::PendingVariable;
    use pretty_assertions::assert_eq;
    use weft_domain::ProjectId;

    fn project() -> Project {
        Project::new(ProjectId(1), "demo")
            .with_node(StringNode::new(NodeId(1), "h1", "friend").with_name("user"))
            .with_node(StringNode::new(NodeId(2), "h2", "Hi {{user}}").with_name("greeting"))
    }

    fn request(project: &Project, draft: Draft) -> CommitRequest {
        CommitRequest {
            project: Arc::new(project.clone()),
            draft,
            pending: PendingVariables::new(),
        }
    }

    fn named(content: &str, name: &str) -> Draft {
        let mut draft = Draft::new(content);
        draft.set_variable_name(name);
        draft
    }

    #[tokio::test]
    async fn test_unknown_reference_is_materialized_before_save() {
        let store = MockStore::new(project());
        let (sink, seen) = recording_sink();
        let use_case = CommitDraft::new(store.clone(), sink);

        let outcome = use_case
            .execute(&request(&project(), Draft::new("Hello {{name}}")))
            .await
            .unwrap();

        let calls = store.calls();
        assert_eq!(calls.len(), 3);
        assert!(matches!(&calls[0], StoreCall::Create(n) if n.name.as_deref() == Some("name")));
        assert!(matches!(&calls[1], StoreCall::Save(s) if s.content == "Hello {{name}}"));
        assert_eq!(calls[2], StoreCall::Fetch);

        assert_eq!(outcome.materialized.len(), 1);
        assert_eq!(outcome.materialized[0].content, "New string content");
        assert!(outcome.project.is_some());
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert!(!outcome.draft.temporary);
        assert_eq!(outcome.draft.node_id, Some(outcome.node_id));
    }

    #[tokio::test]
    async fn test_existing_references_materialize_nothing() {
        let store = MockStore::new(project());
        let use_case = CommitDraft::new(store.clone(), |_: &Project| {});

        use_case
            .execute(&request(&project(), Draft::new("{{greeting}}, {{user}}")))
            .await
            .unwrap();

        assert_eq!(store.create_count(), 0);
    }

    #[tokio::test]
    async fn test_cycle_is_rejected_before_save() {
        let project = Project::new(ProjectId(1), "p")
            .with_node(StringNode::new(NodeId(1), "a", "{{B}}").with_name("A"))
            .with_node(StringNode::new(NodeId(2), "b", "x").with_name("B"));
        let store = MockStore::new(project.clone());
        let use_case = CommitDraft::new(store.clone(), |_: &Project| {});

        let mut draft = Draft::from_node(&project.strings[1], &[], false);
        draft.set_content("{{A}}");
        let err = use_case.execute(&request(&project, draft)).await.unwrap_err();

        assert_eq!(
            err,
            CommitError::CircularReference(CyclePath(vec!["B".into(), "A".into(), "B".into()]))
        );
        assert_eq!(err.kind(), CommitErrorKind::CircularReference);
        assert_eq!(err.details().as_deref(), Some("B -> A -> B"));
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn test_cycle_through_materialized_pending_variable() {
        let store = MockStore::new(project());
        let use_case = CommitDraft::new(store.clone(), |_: &Project| {});

        let mut req = request(&project(), named("{{loop}}", "top"));
        req.pending
            .insert("loop".to_string(), PendingVariable::new("back to {{top}}"));
        let err = use_case.execute(&req).await.unwrap_err();

        assert!(matches!(err, CommitError::CircularReference(_)));
        assert_eq!(store.create_count(), 1);
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn test_materialization_failure_is_skipped() {
        let store = MockStore::new(project());
        store.fail_create_for("broken");
        let use_case = CommitDraft::new(store.clone(), |_: &Project| {});

        let outcome = use_case
            .execute(&request(&project(), Draft::new("{{broken}} {{fine}}")))
            .await
            .unwrap();

        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].name, "broken");
        assert_eq!(outcome.materialized[0].name, "fine");
        assert!(outcome.has_warnings());
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn test_save_failure_aborts() {
        let store = MockStore::new(project());
        store.fail_saves();
        let use_case = CommitDraft::new(store.clone(), |_: &Project| {});

        let err = use_case
            .execute(&request(&project(), Draft::new("plain")))
            .await
            .unwrap_err();

        assert!(matches!(err, CommitError::Persistence(_)));
        assert_eq!(err.kind(), CommitErrorKind::Persistence);
        assert!(!store.calls().contains(&StoreCall::Fetch));
    }

    #[tokio::test]
    async fn test_refresh_failure_is_a_soft_warning() {
        let store = MockStore::new(project());
        store.fail_fetches();
        let (sink, seen) = recording_sink();
        let use_case = CommitDraft::new(store.clone(), sink);

        let outcome = use_case
            .execute(&request(&project(), Draft::new("plain")))
            .await
            .unwrap();

        assert!(outcome.project.is_none());
        assert!(outcome.refresh_failure.is_some());
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn test_blank_content_falls_back_to_name_then_default() {
        let store = MockStore::new(project());
        let use_case = CommitDraft::new(store.clone(), |_: &Project| {});

        let outcome = use_case
            .execute(&request(&project(), named("  ", "title")))
            .await
            .unwrap();
        assert_eq!(outcome.draft.content, "title");

        let outcome = use_case
            .execute(&request(&project(), Draft::new("")))
            .await
            .unwrap();
        assert_eq!(outcome.draft.content, "New string content");
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected_without_store_calls() {
        let store = MockStore::new(project());
        let use_case = CommitDraft::new(store.clone(), |_: &Project| {});

        let err = use_case
            .execute(&request(&project(), named("x", "user")))
            .await
            .unwrap_err();

        assert_eq!(err, CommitError::DuplicateName("user".to_string()));
        assert_eq!(err.kind(), CommitErrorKind::Validation);
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_renaming_to_own_name_is_not_a_duplicate() {
        let project = project();
        let store = MockStore::new(project.clone());
        let use_case = CommitDraft::new(store.clone(), |_: &Project| {});

        let mut draft = Draft::from_node(&project.strings[0], &[], false);
        draft.set_content("buddy");
        assert!(use_case.execute(&request(&project, draft)).await.is_ok());
    }

    #[tokio::test]
    async fn test_empty_spawns_rejected() {
        let store = MockStore::new(project());
        let use_case = CommitDraft::new(store.clone(), |_: &Project| {});

        let mut draft = named("", "tone");
        draft.set_conditional(true, "first");
        draft.add_spawn("");
        draft.add_spawn(" ");

        let err = use_case.execute(&request(&project(), draft)).await.unwrap_err();
        assert_eq!(err, CommitError::EmptySpawns(2));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_conditional_saves_ordered_spawns_and_materializes_spawn_refs() {
        let store = MockStore::new(project());
        let use_case = CommitDraft::new(store.clone(), |_: &Project| {});

        let mut draft = named("", "tone");
        draft.set_conditional(true, "Hello {{user}}");
        draft.add_spawn("Bye {{farewell_name}}");
        draft.set_include_hidden_option(true);

        use_case.execute(&request(&project(), draft)).await.unwrap();

        let calls = store.calls();
        assert!(matches!(&calls[0], StoreCall::Create(n) if n.name.as_deref() == Some("farewell_name")));
        let StoreCall::Save(save) = &calls[1] else {
            panic!("expected a save, got {:?}", calls[1]);
        };
        let spawns = save.spawns.as_ref().unwrap();
        assert!(spawns.include_hidden_option);
        let contents: Vec<_> = spawns.spawns.iter().map(|s| s.content.as_str()).collect();
        assert_eq!(contents, vec!["Hello {{user}}", "Bye {{farewell_name}}"]);
    }

    #[tokio::test]
    async fn test_own_name_is_not_materialized() {
        let store = MockStore::new(project());
        let use_case = CommitDraft::new(store.clone(), |_: &Project| {});

        let err = use_case
            .execute(&request(&project(), named("me {{me}}", "me")))
            .await
            .unwrap_err();

        assert!(matches!(err, CommitError::CircularReference(_)));
        assert_eq!(store.create_count(), 0);
    }

    #[tokio::test]
    async fn test_pending_variable_created_with_its_content() {
        let store = MockStore::new(project());
        let use_case = CommitDraft::new(store.clone(), |_: &Project| {});

        let mut req = request(&project(), Draft::new("{{tone}}"));
        req.pending
            .insert("tone".to_string(), PendingVariable::conditional("Formal"));
        let outcome = use_case.execute(&req).await.unwrap();

        assert_eq!(outcome.materialized[0].content, "Formal");
        assert!(outcome.materialized[0].is_conditional);
    }

    #[tokio::test]
    async fn test_custom_settings() {
        let store = MockStore::new(project());
        let settings = EditorSettings {
            materialized_content: "TBD".to_string(),
            ..EditorSettings::default()
        };
        let use_case = CommitDraft::new(store.clone(), |_: &Project| {}).with_settings(&settings);

        let outcome = use_case
            .execute(&request(&project(), Draft::new("{{later}}")))
            .await
            .unwrap();
        assert_eq!(outcome.materialized[0].content, "TBD");
        assert_eq!(use_case.store().create_count(), 1);
    }
}
