//! A drawer stack wired to the commit pipeline.

use tracing::info;
use weft_domain::{EditorSettings, Project, ProjectId};

use super::frame::FrameId;
use super::stack::{DrawerError, DrawerStack, Settled};
use crate::ports::{ProjectSink, StoreError, StringStore};
use crate::use_cases::{CommitDraft, CommitError};

/// Errors from a session commit.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The stack rejected the operation.
    #[error(transparent)]
    Drawer(#[from] DrawerError),

    /// The commit pipeline failed; the frame stays open with the error.
    #[error(transparent)]
    Commit(#[from] CommitError),

    /// The frame was closed before its save settled.
    #[error("Frame {0} was closed while saving")]
    Detached(FrameId),
}

/// An editing session over one project.
pub struct DrawerSession<S, P> {
    stack: DrawerStack,
    commit: CommitDraft<S, P>,
}

impl<S: StringStore, P: ProjectSink> DrawerSession<S, P> {
    /// Creates a session over an already loaded snapshot.
    pub fn new(project: Project, store: S, sink: P, settings: &EditorSettings) -> Self {
        Self {
            stack: DrawerStack::new(project).with_settings(settings),
            commit: CommitDraft::new(store, sink).with_settings(settings),
        }
    }

    /// Loads the project from the store and opens a session over it.
    ///
    /// # Errors
    /// Returns the store error if the project cannot be fetched.
    pub async fn load(
        project_id: ProjectId,
        store: S,
        sink: P,
        settings: &EditorSettings,
    ) -> Result<Self, StoreError> {
        let project = store.fetch_project(project_id).await?;
        info!(project = %project_id, nodes = project.strings.len(), "Project loaded");
        Ok(Self::new(project, store, sink, settings))
    }

    /// Returns the stack.
    pub const fn stack(&self) -> &DrawerStack {
        &self.stack
    }

    /// Returns the stack for opening frames and editing drafts.
    pub const fn stack_mut(&mut self) -> &mut DrawerStack {
        &mut self.stack
    }

    /// Commits a frame.
    ///
    /// A new spawn is written back into its parent's slot. Every other frame
    /// goes through the commit pipeline and closes, together with the frames
    /// above it, once the save succeeds.
    ///
    /// # Errors
    /// Returns `SessionError::Drawer` if the frame cannot commit right now and
    /// `SessionError::Commit` if the pipeline failed.
    pub async fn commit(&mut self, frame: FrameId) -> Result<Settled, SessionError> {
        let applies_locally = self
            .stack
            .frame(frame)
            .ok_or(DrawerError::FrameNotFound(frame))?
            .applies_locally();
        if applies_locally {
            return Ok(self.stack.apply_spawn(frame)?);
        }

        let request = self.stack.begin_commit(frame)?;
        let result = self.commit.execute(&request).await;
        self.stack
            .finish_commit(frame, result)?
            .ok_or(SessionError::Detached(frame))
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
    use crate::drawer::FrameOptions;
    use crate::test_support::{MockStore, StoreCall, recording_sink};
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};
    use weft_domain::{CommitErrorKind, NodeId, StringNode};

    fn project() -> Project {
        Project::new(ProjectId(7), "demo")
            .with_node(StringNode::new(NodeId(1), "h1", "{{b}}").with_name("a"))
            .with_node(StringNode::new(NodeId(2), "h2", "plain").with_name("b"))
    }

    fn session(store: &MockStore) -> DrawerSession<MockStore, impl ProjectSink> {
        let (sink, _) = recording_sink();
        DrawerSession::new(project(), store.clone(), sink, &EditorSettings::default())
    }

    #[tokio::test]
    async fn test_create_commit_materializes_saves_refreshes_and_closes() {
        let store = MockStore::new(project());
        let (sink, seen) = recording_sink();
        let mut session = DrawerSession::new(project(), store.clone(), sink, &EditorSettings::default());

        let committed = Arc::new(Mutex::new(None));
        let captured = Arc::clone(&committed);
        let frame = session.stack_mut().open_create(
            "Hello {{user}}",
            false,
            FrameOptions::new().on_success(move |draft| {
                *captured.lock().unwrap() = draft.node_id;
            }),
        );
        session.stack_mut().update_variable_name(frame, "greeting").unwrap();

        let settled = session.commit(frame).await.unwrap();

        let calls = store.calls();
        assert!(matches!(&calls[0], StoreCall::Create(n) if n.name.as_deref() == Some("user")));
        assert!(matches!(&calls[1], StoreCall::Save(s) if s.name.as_deref() == Some("greeting")));
        assert_eq!(calls[2], StoreCall::Fetch);

        let outcome = settled.outcome.unwrap();
        assert_eq!(*committed.lock().unwrap(), Some(outcome.node_id));
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert!(session.stack().is_empty());
        let snapshot = session.stack().project();
        assert!(snapshot.node_named("user").is_some());
        assert!(snapshot.node_named("greeting").is_some());
    }

    #[tokio::test]
    async fn test_nested_create_commits_child_and_leaves_parent_open() {
        let store = MockStore::new(project());
        let mut session = session(&store);

        let root = session.stack_mut().open_create("{{title}} {{b}}", false, FrameOptions::new());
        let child = session
            .stack_mut()
            .open_reference(root, "title", FrameOptions::new())
            .unwrap();
        session.stack_mut().update_content(child, "Dr").unwrap();

        session.commit(child).await.unwrap();

        assert_eq!(session.stack().len(), 1);
        let root_frame = session.stack().frame(root).unwrap();
        assert_eq!(root_frame.draft().content, "{{title}} {{b}}");
        assert!(root_frame.snapshot().node_named("title").is_some());

        session.commit(root).await.unwrap();
        // title now exists, so the root commit creates nothing
        assert_eq!(store.create_count(), 0);
        assert_eq!(store.save_count(), 2);
    }

    #[tokio::test]
    async fn test_cycle_keeps_frame_open_with_error() {
        let store = MockStore::new(project());
        let mut session = session(&store);

        let frame = session.stack_mut().open_edit(NodeId(2), FrameOptions::new()).unwrap();
        session.stack_mut().update_content(frame, "{{a}}").unwrap();

        let error = session.commit(frame).await.unwrap_err();

        assert!(matches!(error, SessionError::Commit(CommitError::CircularReference(_))));
        assert_eq!(store.save_count(), 0);
        let frame = session.stack().frame(frame).unwrap();
        assert_eq!(frame.state().error_kind(), Some(CommitErrorKind::CircularReference));
        assert_eq!(frame.draft().content, "{{a}}");
    }

    #[tokio::test]
    async fn test_new_spawn_is_saved_with_its_parent() {
        let store = MockStore::new(project());
        let mut session = session(&store);

        let parent = session.stack_mut().open_create("", true, FrameOptions::new());
        session.stack_mut().update_variable_name(parent, "tone").unwrap();
        let spawn = session.stack_mut().open_spawn(parent, 0, FrameOptions::new()).unwrap();
        session.stack_mut().update_content(spawn, "Howdy").unwrap();

        let applied = session.commit(spawn).await.unwrap();
        assert!(applied.outcome.is_none());
        assert!(store.calls().is_empty());

        session.commit(parent).await.unwrap();
        let saved = store
            .calls()
            .into_iter()
            .find_map(|c| match c {
                StoreCall::Save(s) => s.spawns,
                _ => None,
            })
            .unwrap();
        assert_eq!(saved.spawns.len(), 1);
        assert_eq!(saved.spawns[0].content, "Howdy");
        assert_eq!(saved.spawns[0].target, None);
    }

    #[tokio::test]
    async fn test_load_fetches_snapshot() {
        let store = MockStore::new(project());
        let (sink, _) = recording_sink();
        let session = DrawerSession::load(ProjectId(7), store.clone(), sink, &EditorSettings::default())
            .await
            .unwrap();
        assert_eq!(session.stack().project().strings.len(), 2);
        assert_eq!(store.calls(), vec![StoreCall::Fetch]);
    }

    #[tokio::test]
    async fn test_unknown_frame() {
        let store = MockStore::new(project());
        let mut session = session(&store);
        let frame = session.stack_mut().open_create("x", false, FrameOptions::new());
        session.stack_mut().pop().unwrap();
        assert!(matches!(
            session.commit(frame).await,
            Err(SessionError::Drawer(DrawerError::FrameNotFound(_)))
        ));
    }
}
