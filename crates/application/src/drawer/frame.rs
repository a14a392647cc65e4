//! Editor frames.
//!
//! A frame is one open editor in the cascading stack. It owns its draft and
//! never reaches into another frame's fields; nested frames only remember
//! which frame (and which spawn slot) they were opened from.

use std::fmt;
use std::sync::Arc;

use weft_domain::{Draft, FrameState, Project};

use crate::variable_resolver::{PendingVariable, PendingVariables};

/// Identity of a frame within one stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub(crate) u64);

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a frame was opened from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOrigin {
    /// Opened directly, not on behalf of another frame.
    Standalone,
    /// Opened for a `{{name}}` reference in the parent's content.
    Reference {
        /// The frame whose content holds the reference.
        parent: FrameId,
        /// The referenced name.
        name: String,
    },
    /// Opened for one spawn of the parent's conditional draft.
    Spawn {
        /// The conditional's frame.
        parent: FrameId,
        /// Key of the spawn slot in the parent's draft.
        key: String,
    },
}

impl FrameOrigin {
    /// Returns the parent frame, if any.
    #[must_use]
    pub const fn parent(&self) -> Option<FrameId> {
        match self {
            Self::Standalone => None,
            Self::Reference { parent, .. } | Self::Spawn { parent, .. } => Some(*parent),
        }
    }
}

/// Called with the committed draft once a frame commits.
pub type SuccessCallback = Box<dyn FnOnce(&Draft) + Send>;

/// Options for opening a frame.
#[derive(Default)]
pub struct FrameOptions {
    /// Heading shown above the editor.
    pub title: Option<String>,
    /// Variables the frame may reference before they exist.
    pub pending: PendingVariables,
    /// Called once the frame commits.
    pub on_success: Option<SuccessCallback>,
}

impl FrameOptions {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Adds a pending variable.
    #[must_use]
    pub fn with_pending(mut self, name: impl Into<String>, variable: PendingVariable) -> Self {
        self.pending.insert(name.into(), variable);
        self
    }

    /// Sets the success callback.
    #[must_use]
    pub fn on_success(mut self, callback: impl FnOnce(&Draft) + Send + 'static) -> Self {
        self.on_success = Some(Box::new(callback));
        self
    }
}

impl fmt::Debug for FrameOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameOptions")
            .field("title", &self.title)
            .field("pending", &self.pending)
            .field("on_success", &self.on_success.is_some())
            .finish()
    }
}

/// One open editor.
pub struct Frame {
    pub(crate) id: FrameId,
    pub(crate) origin: FrameOrigin,
    pub(crate) level: usize,
    pub(crate) title: Option<String>,
    pub(crate) draft: Draft,
    pub(crate) state: FrameState,
    pub(crate) snapshot: Arc<Project>,
    pub(crate) pending: PendingVariables,
    pub(crate) on_success: Option<SuccessCallback>,
}

impl Frame {
    pub(crate) fn new(
        id: FrameId,
        origin: FrameOrigin,
        level: usize,
        draft: Draft,
        snapshot: Arc<Project>,
        options: FrameOptions,
    ) -> Self {
        Self {
            id,
            origin,
            level,
            title: options.title,
            draft,
            state: FrameState::Open,
            snapshot,
            pending: options.pending,
            on_success: options.on_success,
        }
    }

    /// Returns the frame id.
    #[must_use]
    pub const fn id(&self) -> FrameId {
        self.id
    }

    /// Returns where the frame was opened from.
    #[must_use]
    pub const fn origin(&self) -> &FrameOrigin {
        &self.origin
    }

    /// Returns the position in the stack, 0 for the bottom frame.
    #[must_use]
    pub const fn level(&self) -> usize {
        self.level
    }

    /// Returns the heading, if one was given.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Returns the working draft.
    #[must_use]
    pub const fn draft(&self) -> &Draft {
        &self.draft
    }

    /// Returns the frame state.
    #[must_use]
    pub const fn state(&self) -> &FrameState {
        &self.state
    }

    /// Returns the snapshot the frame currently works against.
    #[must_use]
    pub const fn snapshot(&self) -> &Arc<Project> {
        &self.snapshot
    }

    /// Returns the pending variables visible to the frame.
    #[must_use]
    pub const fn pending(&self) -> &PendingVariables {
        &self.pending
    }

    /// Returns true when the frame edits an existing variable.
    #[must_use]
    pub const fn is_edit(&self) -> bool {
        self.draft.node_id.is_some()
    }

    /// Returns true when a back button applies (the frame sits on another).
    #[must_use]
    pub const fn shows_back_button(&self) -> bool {
        self.level > 0
    }

    /// Returns true when committing only writes the draft back into the
    /// parent's spawn slot.
    #[must_use]
    pub const fn applies_locally(&self) -> bool {
        matches!(self.origin, FrameOrigin::Spawn { .. }) && self.draft.node_id.is_none()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("id", &self.id)
            .field("origin", &self.origin)
            .field("level", &self.level)
            .field("title", &self.title)
            .field("draft", &self.draft)
            .field("state", &self.state)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}
