//! The cascading editor stack.
//!
//! Frames are pushed on top of each other as the author drills into
//! references and spawns. Closing a frame closes every frame above it and
//! never touches the frames below. Commits are split in two halves,
//! [`DrawerStack::begin_commit`] and [`DrawerStack::finish_commit`], so the
//! store call can run while the other frames stay interactive.

use std::sync::Arc;

use tracing::{debug, info, warn};
use weft_domain::{CloseReason, Draft, EditorSettings, FrameState, NodeId, Project, StringNode};

use super::frame::{Frame, FrameId, FrameOptions, FrameOrigin};
use crate::graph::spawns_of;
use crate::use_cases::{CommitError, CommitOutcome, CommitRequest};
use crate::variable_resolver::{NameResolver, PendingVariables, Resolution};

/// Errors raised by stack operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DrawerError {
    /// No open frame has this id.
    #[error("Frame {0} is not open")]
    FrameNotFound(FrameId),

    /// The frame is saving and cannot change until the save settles.
    #[error("Frame {0} is saving")]
    FrameBusy(FrameId),

    /// The frame's state does not allow edits.
    #[error("Frame {0} cannot be edited")]
    NotEditable(FrameId),

    /// Nested frames open only from the top frame.
    #[error("Frame {0} is not the top frame")]
    NotTopFrame(FrameId),

    /// The parent draft has no spawn at this index.
    #[error("Frame {frame} has no spawn at index {index}")]
    SpawnIndexOutOfRange {
        /// The conditional's frame.
        frame: FrameId,
        /// The requested index.
        index: usize,
    },

    /// The spawn slot a frame was opened for no longer exists in the parent.
    #[error("The spawn edited in frame {0} was removed from its parent")]
    SpawnRemoved(FrameId),

    /// No variable with this id or name.
    #[error("Variable not found: {0}")]
    NodeNotFound(String),

    /// A new spawn is committed into its parent, everything else through the store.
    #[error("Frame {0} cannot be committed this way")]
    CommitRoute(FrameId),
}

/// A commit that went through.
#[derive(Debug)]
pub struct Settled {
    /// The committed draft.
    pub draft: Draft,
    /// The pipeline result; `None` when the draft was only written back into
    /// the parent's spawn slot.
    pub outcome: Option<CommitOutcome>,
    /// Frames closed by the commit, the committed one first.
    pub closed: Vec<Frame>,
}

/// The stack of open editor frames.
pub struct DrawerStack {
    frames: Vec<Frame>,
    project: Arc<Project>,
    settings: EditorSettings,
    next_id: u64,
}

impl DrawerStack {
    /// Creates an empty stack over a project snapshot.
    #[must_use]
    pub fn new(project: Project) -> Self {
        Self {
            frames: Vec::new(),
            project: Arc::new(project),
            settings: EditorSettings::default(),
            next_id: 0,
        }
    }

    /// Applies placeholder contents from `settings`.
    #[must_use]
    pub fn with_settings(mut self, settings: &EditorSettings) -> Self {
        self.settings = settings.clone();
        self
    }

    /// Returns the latest project snapshot.
    #[must_use]
    pub const fn project(&self) -> &Arc<Project> {
        &self.project
    }

    /// Installs a fresh snapshot for the stack and every open frame.
    pub fn replace_project(&mut self, project: Project) {
        let project = Arc::new(project);
        for frame in &mut self.frames {
            frame.snapshot = Arc::clone(&project);
        }
        self.project = project;
    }

    /// Returns the open frames, bottom first.
    #[must_use]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Returns an open frame.
    #[must_use]
    pub fn frame(&self, id: FrameId) -> Option<&Frame> {
        self.frames.iter().find(|f| f.id == id)
    }

    /// Returns the top frame.
    #[must_use]
    pub fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    /// Returns the number of open frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Returns true if no frame is open.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Opens a create frame.
    pub fn open_create(
        &mut self,
        content: impl Into<String>,
        is_conditional: bool,
        options: FrameOptions,
    ) -> FrameId {
        let draft = self.new_draft(content.into(), is_conditional);
        self.push(FrameOrigin::Standalone, draft, options)
    }

    /// Opens an edit frame for an existing variable.
    ///
    /// # Errors
    /// Returns `DrawerError::NodeNotFound` if the snapshot lacks the node.
    pub fn open_edit(&mut self, node: NodeId, options: FrameOptions) -> Result<FrameId, DrawerError> {
        let draft = self
            .project
            .node(node)
            .map(|n| self.edit_draft(n))
            .ok_or_else(|| DrawerError::NodeNotFound(node.to_string()))?;
        Ok(self.push(FrameOrigin::Standalone, draft, options))
    }

    /// Opens a frame for a `{{name}}` referenced from `parent`.
    ///
    /// An existing variable opens for editing. A pending or unknown name opens
    /// a create frame already carrying that name.
    ///
    /// # Errors
    /// Returns an error if `parent` is not the top frame or is saving.
    pub fn open_reference(
        &mut self,
        parent: FrameId,
        name: &str,
        mut options: FrameOptions,
    ) -> Result<FrameId, DrawerError> {
        let parent_frame = self.top_frame(parent)?;
        let inherited = parent_frame.pending.clone();

        let draft = match NameResolver::new(&self.project.strings, &inherited).resolve(name) {
            Resolution::Found(node) => self.edit_draft(node),
            Resolution::Pending(variable) => {
                let mut draft = self.new_draft(variable.content.clone(), variable.is_conditional);
                draft.variable_name = name.to_string();
                draft
            }
            Resolution::Unknown => {
                let mut draft = Draft::new("");
                draft.variable_name = name.to_string();
                draft
            }
        };

        inherit(&mut options.pending, inherited);
        let origin = FrameOrigin::Reference {
            parent,
            name: name.to_string(),
        };
        Ok(self.push(origin, draft, options))
    }

    /// Opens a frame for the spawn at `index` of `parent`'s conditional draft.
    ///
    /// # Errors
    /// Returns an error if `parent` is not the top frame, is saving, or has no
    /// spawn at `index`.
    pub fn open_spawn(
        &mut self,
        parent: FrameId,
        index: usize,
        mut options: FrameOptions,
    ) -> Result<FrameId, DrawerError> {
        let parent_frame = self.top_frame(parent)?;
        let spawn = parent_frame
            .draft
            .spawn(index)
            .map_err(|_| DrawerError::SpawnIndexOutOfRange { frame: parent, index })?;

        let mut draft = spawn.clone();
        draft.dirty = false;
        draft.link_only = false;
        let key = spawn.key.clone();
        let inherited = parent_frame.pending.clone();

        inherit(&mut options.pending, inherited);
        Ok(self.push(FrameOrigin::Spawn { parent, key }, draft, options))
    }

    /// Replaces a frame's content.
    ///
    /// # Errors
    /// Returns an error if the frame is not open for edits.
    pub fn update_content(&mut self, frame: FrameId, content: impl Into<String>) -> Result<(), DrawerError> {
        self.editable(frame)?.draft.set_content(content);
        Ok(())
    }

    /// Replaces a frame's variable name.
    ///
    /// # Errors
    /// Returns an error if the frame is not open for edits.
    pub fn update_variable_name(&mut self, frame: FrameId, name: impl Into<String>) -> Result<(), DrawerError> {
        self.editable(frame)?.draft.set_variable_name(name);
        Ok(())
    }

    /// Switches a frame's draft between plain and conditional.
    ///
    /// # Errors
    /// Returns an error if the frame is not open for edits.
    pub fn set_conditional(&mut self, frame: FrameId, is_conditional: bool) -> Result<(), DrawerError> {
        let placeholder = self.settings.default_spawn_content.clone();
        self.editable(frame)?
            .draft
            .set_conditional(is_conditional, &placeholder);
        Ok(())
    }

    /// Sets whether the conditional offers the Hidden option.
    ///
    /// # Errors
    /// Returns an error if the frame is not open for edits.
    pub fn set_include_hidden_option(&mut self, frame: FrameId, include: bool) -> Result<(), DrawerError> {
        self.editable(frame)?.draft.set_include_hidden_option(include);
        Ok(())
    }

    /// Appends a new spawn with placeholder content and returns its index.
    ///
    /// # Errors
    /// Returns an error if the frame is not open for edits.
    pub fn add_spawn(&mut self, frame: FrameId) -> Result<usize, DrawerError> {
        let content = self.settings.new_spawn_content.clone();
        Ok(self.editable(frame)?.draft.add_spawn(content))
    }

    /// Appends an existing variable as a spawn and returns its index.
    ///
    /// # Errors
    /// Returns an error if the frame is not open for edits or the variable
    /// does not exist.
    pub fn add_existing_spawn(&mut self, frame: FrameId, node: NodeId) -> Result<usize, DrawerError> {
        let project = Arc::clone(&self.project);
        let node = project
            .node(node)
            .ok_or_else(|| DrawerError::NodeNotFound(node.to_string()))?;
        Ok(self.editable(frame)?.draft.add_existing_spawn(node))
    }

    /// Replaces the content of one spawn.
    ///
    /// # Errors
    /// Returns an error if the frame is not open for edits or has no such spawn.
    pub fn update_spawn_content(
        &mut self,
        frame: FrameId,
        index: usize,
        content: impl Into<String>,
    ) -> Result<(), DrawerError> {
        self.editable(frame)?
            .draft
            .update_spawn_content(index, content)
            .map_err(|_| DrawerError::SpawnIndexOutOfRange { frame, index })
    }

    /// Removes one spawn and returns it.
    ///
    /// # Errors
    /// Returns an error if the frame is not open for edits or has no such spawn.
    pub fn remove_spawn(&mut self, frame: FrameId, index: usize) -> Result<Draft, DrawerError> {
        self.editable(frame)?
            .draft
            .remove_spawn(index)
            .map_err(|_| DrawerError::SpawnIndexOutOfRange { frame, index })
    }

    /// Records a variable the frame references before it exists.
    ///
    /// # Errors
    /// Returns an error if the frame is not open for edits.
    pub fn set_pending(
        &mut self,
        frame: FrameId,
        name: impl Into<String>,
        variable: crate::variable_resolver::PendingVariable,
    ) -> Result<(), DrawerError> {
        self.editable(frame)?.pending.insert(name.into(), variable);
        Ok(())
    }

    /// Closes `frame` and every frame above it, discarding their drafts.
    ///
    /// Frames below are left untouched.
    ///
    /// # Errors
    /// Returns `DrawerError::FrameBusy` if any of the frames to close is saving.
    pub fn back(&mut self, frame: FrameId) -> Result<Vec<Frame>, DrawerError> {
        let pos = self.position(frame)?;
        if let Some(busy) = self.frames[pos..].iter().find(|f| f.state.is_saving()) {
            return Err(DrawerError::FrameBusy(busy.id));
        }
        Ok(self.close_from(pos, CloseReason::Cancelled))
    }

    /// Closes the top frame, if any.
    ///
    /// # Errors
    /// Returns `DrawerError::FrameBusy` if the top frame is saving.
    pub fn pop(&mut self) -> Result<Option<Frame>, DrawerError> {
        let Some(top) = self.top().map(Frame::id) else {
            return Ok(None);
        };
        Ok(self.back(top)?.pop())
    }

    /// Moves a frame to `Saving` and hands out what the commit pipeline needs.
    ///
    /// # Errors
    /// Returns an error if the frame is not open for edits, or if it is a new
    /// spawn that must be applied with [`DrawerStack::apply_spawn`] instead.
    pub fn begin_commit(&mut self, frame: FrameId) -> Result<CommitRequest, DrawerError> {
        let target = self.editable(frame)?;
        if target.applies_locally() {
            return Err(DrawerError::CommitRoute(frame));
        }

        target.state = FrameState::Saving;
        debug!(frame = %frame, key = %target.draft.key, "Commit started");
        Ok(CommitRequest {
            project: Arc::clone(&target.snapshot),
            draft: target.draft.clone(),
            pending: target.pending.clone(),
        })
    }

    /// Settles a commit started with [`DrawerStack::begin_commit`].
    ///
    /// On success the frame closes with every frame above it, a persisted
    /// spawn's slot in the parent is refreshed and the success callback runs.
    /// On failure the frame stays open with the error and its draft. A frame
    /// closed while its save was in flight is detached: `Ok(None)` is returned
    /// and nothing changes.
    ///
    /// # Errors
    /// Returns the commit error after recording it on the frame.
    pub fn finish_commit(
        &mut self,
        frame: FrameId,
        result: Result<CommitOutcome, CommitError>,
    ) -> Result<Option<Settled>, CommitError> {
        let Ok(pos) = self.position(frame) else {
            match &result {
                Ok(outcome) => warn!(frame = %frame, node = %outcome.node_id, "Save finished for a detached frame; result ignored"),
                Err(error) => warn!(frame = %frame, error = %error, "Save failed for a detached frame; error ignored"),
            }
            return Ok(None);
        };

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(frame = %frame, error = %error, "Commit failed");
                self.frames[pos].state = FrameState::Failed {
                    kind: error.kind(),
                    message: error.to_string(),
                    details: error.details(),
                };
                return Err(error);
            }
        };

        if let Some(project) = &outcome.project {
            self.replace_project(project.clone());
        }
        if let FrameOrigin::Spawn { parent, key } = self.frames[pos].origin.clone() {
            self.refresh_spawn_slot(parent, &key, &outcome.draft);
        }

        let mut closed = self.close_from(pos, CloseReason::Committed);
        if let Some(callback) = closed.first_mut().and_then(|f| f.on_success.take()) {
            callback(&outcome.draft);
        }
        info!(frame = %frame, node = %outcome.node_id, "Frame committed");

        Ok(Some(Settled {
            draft: outcome.draft.clone(),
            outcome: Some(outcome),
            closed,
        }))
    }

    /// Commits a new spawn by writing it back into its parent's spawn slot.
    /// Nothing is persisted until the parent commits.
    ///
    /// # Errors
    /// Returns an error if the frame is not a new spawn, is not editable, its
    /// parent is saving, or the slot was removed from the parent.
    pub fn apply_spawn(&mut self, frame: FrameId) -> Result<Settled, DrawerError> {
        let pos = self.position(frame)?;
        let child = self.editable(frame)?;
        if !child.applies_locally() {
            return Err(DrawerError::CommitRoute(frame));
        }
        let FrameOrigin::Spawn { parent, key } = child.origin.clone() else {
            return Err(DrawerError::CommitRoute(frame));
        };
        let draft = child.draft.clone();

        let parent_frame = self
            .frames
            .iter_mut()
            .find(|f| f.id == parent)
            .ok_or(DrawerError::FrameNotFound(parent))?;
        if parent_frame.state.is_saving() {
            return Err(DrawerError::FrameBusy(parent));
        }
        let index = parent_frame
            .draft
            .conditional_spawns
            .iter()
            .position(|s| s.key == key)
            .ok_or(DrawerError::SpawnRemoved(frame))?;
        parent_frame
            .draft
            .replace_spawn(index, draft.clone())
            .map_err(|_| DrawerError::SpawnIndexOutOfRange { frame: parent, index })?;

        let mut closed = self.close_from(pos, CloseReason::Committed);
        if let Some(callback) = closed.first_mut().and_then(|f| f.on_success.take()) {
            callback(&draft);
        }
        info!(frame = %frame, parent = %parent, "Spawn applied to parent draft");

        Ok(Settled {
            draft,
            outcome: None,
            closed,
        })
    }

    fn push(&mut self, origin: FrameOrigin, draft: Draft, options: FrameOptions) -> FrameId {
        let id = FrameId(self.next_id);
        self.next_id += 1;
        let level = self.frames.len();
        debug!(frame = %id, level, "Frame opened");
        self.frames.push(Frame::new(
            id,
            origin,
            level,
            draft,
            Arc::clone(&self.project),
            options,
        ));
        id
    }

    fn new_draft(&self, content: String, is_conditional: bool) -> Draft {
        if is_conditional {
            Draft::new_conditional(content, self.settings.default_spawn_content.as_str())
        } else {
            Draft::new(content)
        }
    }

    fn edit_draft(&self, node: &StringNode) -> Draft {
        if node.is_conditional_container {
            let set = spawns_of(&self.project, node);
            Draft::from_node(node, &set.spawns, set.has_hidden_option)
        } else {
            Draft::from_node(node, &[], false)
        }
    }

    fn position(&self, frame: FrameId) -> Result<usize, DrawerError> {
        self.frames
            .iter()
            .position(|f| f.id == frame)
            .ok_or(DrawerError::FrameNotFound(frame))
    }

    fn top_frame(&self, frame: FrameId) -> Result<&Frame, DrawerError> {
        let pos = self.position(frame)?;
        let found = &self.frames[pos];
        if pos + 1 != self.frames.len() {
            return Err(DrawerError::NotTopFrame(frame));
        }
        if found.state.is_saving() {
            return Err(DrawerError::FrameBusy(frame));
        }
        Ok(found)
    }

    fn editable(&mut self, frame: FrameId) -> Result<&mut Frame, DrawerError> {
        let found = self
            .frames
            .iter_mut()
            .find(|f| f.id == frame)
            .ok_or(DrawerError::FrameNotFound(frame))?;
        if found.state.is_saving() {
            return Err(DrawerError::FrameBusy(frame));
        }
        if !found.state.is_editable() {
            return Err(DrawerError::NotEditable(frame));
        }
        Ok(found)
    }

    fn close_from(&mut self, pos: usize, reason: CloseReason) -> Vec<Frame> {
        let mut closed: Vec<Frame> = self.frames.drain(pos..).collect();
        for (i, frame) in closed.iter_mut().enumerate() {
            let reason = if i == 0 { reason } else { CloseReason::Superseded };
            if i > 0 && frame.state.is_saving() {
                warn!(frame = %frame.id, "Frame closed while saving; its result will be ignored");
            } else if frame.draft.dirty && reason != CloseReason::Committed {
                debug!(frame = %frame.id, "Unsaved draft discarded");
            }
            frame.state = FrameState::Closed { reason };
        }
        closed
    }

    fn refresh_spawn_slot(&mut self, parent: FrameId, key: &str, committed: &Draft) {
        let Some(parent_frame) = self.frames.iter_mut().find(|f| f.id == parent) else {
            return;
        };
        if parent_frame.state.is_saving() {
            warn!(frame = %parent, "Parent is saving; spawn slot not refreshed");
            return;
        }
        let Some(slot) = parent_frame
            .draft
            .conditional_spawns
            .iter_mut()
            .find(|s| s.key == key)
        else {
            warn!(frame = %parent, key, "Spawn slot no longer in parent; not refreshed");
            return;
        };
        let link_only = slot.link_only;
        *slot = committed.clone();
        slot.link_only = link_only;
    }
}

fn inherit(pending: &mut PendingVariables, inherited: PendingVariables) {
    for (name, variable) in inherited {
        pending.entry(name).or_insert(variable);
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
    use crate::graph::CyclePath;
    use crate::variable_resolver::PendingVariable;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use weft_domain::{
        CommitErrorKind, DEFAULT_SPAWN_CONTENT, Dimension, DimensionId, DimensionValue,
        DimensionValueId, HIDDEN_VALUE, NEW_SPAWN_CONTENT, NodeDimensionValue, ProjectId,
    };

    fn spawn(id: u64, name: &str, content: &str) -> StringNode {
        StringNode::new(NodeId(id), format!("h{id}"), content)
            .with_name(name)
            .with_dimension_value(NodeDimensionValue {
                dimension_value: DimensionValueId(id),
                dimension: DimensionId(1),
                value: name.to_string(),
            })
    }

    fn project() -> Project {
        Project::new(ProjectId(1), "demo")
            .with_node(StringNode::new(NodeId(1), "h1", "friend").with_name("user"))
            .with_node(StringNode::new(NodeId(2), "h2", "").with_name("tone").conditional())
            .with_node(spawn(3, "tone_2", "Later"))
            .with_node(spawn(4, "tone_1", "Hi"))
            .with_dimension(
                Dimension::new(DimensionId(1), "tone")
                    .with_value(DimensionValue::new(DimensionValueId(3), "tone_2"))
                    .with_value(DimensionValue::new(DimensionValueId(4), "tone_1"))
                    .with_value(DimensionValue::new(DimensionValueId(5), HIDDEN_VALUE)),
            )
    }

    fn outcome_for(draft: &Draft, node_id: u64) -> CommitOutcome {
        let mut saved = draft.clone();
        saved.node_id = Some(NodeId(node_id));
        saved.key = node_id.to_string();
        saved.temporary = false;
        saved.dirty = false;
        CommitOutcome {
            node_id: NodeId(node_id),
            draft: saved,
            materialized: Vec::new(),
            skipped: Vec::new(),
            project: None,
            refresh_failure: None,
        }
    }

    fn three_deep(stack: &mut DrawerStack) -> (FrameId, FrameId, FrameId) {
        let f0 = stack.open_create("{{a}}", false, FrameOptions::new());
        let f1 = stack.open_reference(f0, "a", FrameOptions::new()).unwrap();
        stack.update_content(f1, "{{b}}").unwrap();
        let f2 = stack.open_reference(f1, "b", FrameOptions::new()).unwrap();
        (f0, f1, f2)
    }

    #[test]
    fn test_open_create_conditional_seeds_default_spawn() {
        let mut stack = DrawerStack::new(project());
        let id = stack.open_create("", true, FrameOptions::new());
        let frame = stack.frame(id).unwrap();
        assert_eq!(frame.draft().conditional_spawns.len(), 1);
        assert_eq!(frame.draft().conditional_spawns[0].content, DEFAULT_SPAWN_CONTENT);
        assert_eq!(frame.level(), 0);
        assert!(!frame.shows_back_button());
        assert!(!frame.is_edit());
    }

    #[test]
    fn test_open_edit_loads_ordered_spawns_and_hidden_flag() {
        let mut stack = DrawerStack::new(project());
        let id = stack.open_edit(NodeId(2), FrameOptions::new()).unwrap();
        let draft = stack.frame(id).unwrap().draft();

        let names: Vec<_> = draft
            .conditional_spawns
            .iter()
            .map(|s| s.effective_name().unwrap())
            .collect();
        assert_eq!(names, vec!["tone_1", "tone_2"]);
        assert!(draft.include_hidden_option);
        assert!(draft.is_conditional);
    }

    #[test]
    fn test_open_edit_unknown_node() {
        let mut stack = DrawerStack::new(project());
        assert_eq!(
            stack.open_edit(NodeId(99), FrameOptions::new()),
            Err(DrawerError::NodeNotFound("99".to_string()))
        );
        assert!(stack.is_empty());
    }

    #[test]
    fn test_open_reference_resolution() {
        let mut stack = DrawerStack::new(project());
        let root = stack.open_create(
            "{{user}} {{title}} {{fresh}}",
            false,
            FrameOptions::new().with_pending("title", PendingVariable::conditional("Dr")),
        );

        let found = stack.open_reference(root, "user", FrameOptions::new()).unwrap();
        assert_eq!(stack.frame(found).unwrap().draft().node_id, Some(NodeId(1)));
        stack.back(found).unwrap();

        let pending = stack.open_reference(root, "title", FrameOptions::new()).unwrap();
        let draft = stack.frame(pending).unwrap().draft();
        assert_eq!(draft.variable_name, "title");
        assert_eq!(draft.content, "Dr");
        assert!(draft.is_conditional);
        assert!(!draft.dirty);
        stack.back(pending).unwrap();

        let unknown = stack.open_reference(root, "fresh", FrameOptions::new()).unwrap();
        let frame = stack.frame(unknown).unwrap();
        assert_eq!(frame.draft().variable_name, "fresh");
        assert!(frame.draft().is_new());
        assert_eq!(frame.level(), 1);
        assert!(frame.shows_back_button());
        assert_eq!(frame.origin().parent(), Some(root));
        assert!(frame.pending().contains_key("title"));
    }

    #[test]
    fn test_nested_frames_open_only_from_top() {
        let mut stack = DrawerStack::new(project());
        let (f0, _, _) = three_deep(&mut stack);
        assert_eq!(
            stack.open_reference(f0, "user", FrameOptions::new()),
            Err(DrawerError::NotTopFrame(f0))
        );
    }

    #[test]
    fn test_back_closes_target_and_above_only() {
        let mut stack = DrawerStack::new(project());
        let (f0, f1, f2) = three_deep(&mut stack);
        let before = stack.frame(f0).unwrap().draft().clone();

        let closed = stack.back(f1).unwrap();

        let ids: Vec<_> = closed.iter().map(Frame::id).collect();
        assert_eq!(ids, vec![f1, f2]);
        assert_eq!(
            closed[0].state(),
            &FrameState::Closed { reason: CloseReason::Cancelled }
        );
        assert_eq!(
            closed[1].state(),
            &FrameState::Closed { reason: CloseReason::Superseded }
        );
        assert_eq!(stack.len(), 1);
        let root = stack.frame(f0).unwrap();
        assert_eq!(root.state(), &FrameState::Open);
        assert_eq!(root.draft(), &before);
    }

    #[test]
    fn test_back_refuses_while_a_frame_above_is_saving() {
        let mut stack = DrawerStack::new(project());
        let (f0, _, f2) = three_deep(&mut stack);
        stack.begin_commit(f2).unwrap();
        assert_eq!(stack.back(f0).map(|_| ()), Err(DrawerError::FrameBusy(f2)));
        assert_eq!(stack.len(), 3);
    }

    #[test]
    fn test_saving_frame_rejects_edits_but_others_stay_interactive() {
        let mut stack = DrawerStack::new(project());
        let (f0, f1, _) = three_deep(&mut stack);
        stack.begin_commit(f1).unwrap();

        assert_eq!(stack.update_content(f1, "x"), Err(DrawerError::FrameBusy(f1)));
        assert_eq!(stack.begin_commit(f1).map(|_| ()), Err(DrawerError::FrameBusy(f1)));
        assert!(stack.update_content(f0, "still editable").is_ok());
    }

    #[test]
    fn test_failed_commit_keeps_frame_and_draft() {
        let mut stack = DrawerStack::new(project());
        let id = stack.open_create("{{x}}", false, FrameOptions::new());
        stack.begin_commit(id).unwrap();

        let error = CommitError::CircularReference(CyclePath(vec!["x".into(), "x".into()]));
        let result = stack.finish_commit(id, Err(error.clone()));

        assert_eq!(result.unwrap_err(), error);
        let frame = stack.frame(id).unwrap();
        assert_eq!(frame.state().error_kind(), Some(CommitErrorKind::CircularReference));
        assert!(frame.state().is_editable());
        assert_eq!(frame.draft().content, "{{x}}");
        // retry is allowed
        assert!(stack.begin_commit(id).is_ok());
    }

    #[test]
    fn test_successful_commit_closes_frame_and_runs_callback() {
        let mut stack = DrawerStack::new(project());
        let seen = Arc::new(Mutex::new(None));
        let captured = Arc::clone(&seen);
        let root = stack.open_create("base", false, FrameOptions::new());
        let id = stack.open_reference(
            root,
            "fresh",
            FrameOptions::new().on_success(move |draft| {
                *captured.lock().unwrap() = draft.node_id;
            }),
        ).unwrap();

        let request = stack.begin_commit(id).unwrap();
        let mut outcome = outcome_for(&request.draft, 42);
        outcome.project = Some(project().with_node(StringNode::new(NodeId(42), "h42", "").with_name("fresh")));
        let settled = stack.finish_commit(id, Ok(outcome)).unwrap().unwrap();

        assert_eq!(*seen.lock().unwrap(), Some(NodeId(42)));
        assert_eq!(settled.closed.len(), 1);
        assert_eq!(
            settled.closed[0].state(),
            &FrameState::Closed { reason: CloseReason::Committed }
        );
        assert_eq!(stack.len(), 1);
        // the refreshed snapshot reaches the stack and the frames left open
        assert!(stack.project().node(NodeId(42)).is_some());
        assert!(stack.frame(root).unwrap().snapshot().node(NodeId(42)).is_some());
    }

    #[test]
    fn test_commit_below_detaches_saving_frame_above() {
        let mut stack = DrawerStack::new(project());
        let root = stack.open_create("{{a}}", false, FrameOptions::new());
        let child = stack.open_reference(root, "a", FrameOptions::new()).unwrap();

        let child_request = stack.begin_commit(child).unwrap();
        let root_request = stack.begin_commit(root).unwrap();

        let settled = stack
            .finish_commit(root, Ok(outcome_for(&root_request.draft, 10)))
            .unwrap()
            .unwrap();
        assert_eq!(settled.closed.len(), 2);
        assert_eq!(
            settled.closed[1].state(),
            &FrameState::Closed { reason: CloseReason::Superseded }
        );
        assert!(stack.is_empty());

        // the child's save settles later and is ignored
        let late = stack.finish_commit(child, Ok(outcome_for(&child_request.draft, 11)));
        assert!(late.unwrap().is_none());
    }

    #[test]
    fn test_new_spawn_applies_to_parent_slot() {
        let mut stack = DrawerStack::new(project());
        let parent = stack.open_create("", true, FrameOptions::new());
        let child = stack.open_spawn(parent, 0, FrameOptions::new()).unwrap();
        assert!(stack.frame(child).unwrap().applies_locally());

        stack.update_content(child, "Edited in a nested frame").unwrap();
        assert_eq!(stack.begin_commit(child).map(|_| ()), Err(DrawerError::CommitRoute(child)));

        let settled = stack.apply_spawn(child).unwrap();
        assert!(settled.outcome.is_none());

        let parent_draft = stack.frame(parent).unwrap().draft();
        assert_eq!(parent_draft.conditional_spawns[0].content, "Edited in a nested frame");
        assert!(parent_draft.dirty);
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn test_removed_spawn_cannot_be_applied() {
        let mut stack = DrawerStack::new(project());
        let parent = stack.open_create("", true, FrameOptions::new());
        let child = stack.open_spawn(parent, 0, FrameOptions::new()).unwrap();
        stack.remove_spawn(parent, 0).unwrap();
        assert_eq!(stack.apply_spawn(child).map(|_| ()), Err(DrawerError::SpawnRemoved(child)));
    }

    #[test]
    fn test_persisted_spawn_commit_refreshes_parent_slot() {
        let mut stack = DrawerStack::new(project());
        let parent = stack.open_edit(NodeId(2), FrameOptions::new()).unwrap();
        let child = stack.open_spawn(parent, 1, FrameOptions::new()).unwrap();
        assert!(!stack.frame(child).unwrap().applies_locally());

        stack.update_content(child, "Much later").unwrap();
        let request = stack.begin_commit(child).unwrap();
        assert_eq!(request.draft.node_id, Some(NodeId(3)));
        stack.finish_commit(child, Ok(outcome_for(&request.draft, 3))).unwrap();

        let slot = &stack.frame(parent).unwrap().draft().conditional_spawns[1];
        assert_eq!(slot.content, "Much later");
        assert_eq!(slot.node_id, Some(NodeId(3)));
    }

    #[test]
    fn test_spawn_editing_operations() {
        let mut stack = DrawerStack::new(project());
        let id = stack.open_create("Hello", false, FrameOptions::new());
        stack.set_conditional(id, true).unwrap();
        let index = stack.add_spawn(id).unwrap();
        stack.update_spawn_content(id, 0, "Hey").unwrap();
        let linked = stack.add_existing_spawn(id, NodeId(1)).unwrap();
        stack.set_include_hidden_option(id, true).unwrap();

        let draft = stack.frame(id).unwrap().draft();
        assert_eq!(draft.conditional_spawns[0].content, "Hey");
        assert_eq!(draft.conditional_spawns[index].content, NEW_SPAWN_CONTENT);
        assert!(draft.conditional_spawns[linked].link_only);
        assert!(draft.include_hidden_option);

        assert_eq!(
            stack.update_spawn_content(id, 9, "x"),
            Err(DrawerError::SpawnIndexOutOfRange { frame: id, index: 9 })
        );
        assert_eq!(
            stack.add_existing_spawn(id, NodeId(77)),
            Err(DrawerError::NodeNotFound("77".to_string()))
        );

        stack.set_conditional(id, false).unwrap();
        let draft = stack.frame(id).unwrap().draft();
        assert!(draft.conditional_spawns.is_empty());
        assert!(!draft.include_hidden_option);
    }

    #[test]
    fn test_pop_and_unknown_frames() {
        let mut stack = DrawerStack::new(project());
        assert!(stack.pop().unwrap().is_none());
        let id = stack.open_create("x", false, FrameOptions::new());
        assert_eq!(stack.pop().unwrap().map(|f| f.id()), Some(id));
        assert_eq!(stack.update_content(id, "y"), Err(DrawerError::FrameNotFound(id)));
        assert_eq!(stack.back(id).map(|_| ()), Err(DrawerError::FrameNotFound(id)));
    }
}
