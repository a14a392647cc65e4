//! Editor frame state types for UI binding.
//!
//! Each frame of the cascading editor moves through
//! `Open -> Saving -> Closed(Committed)` or back to `Failed` (still open, with
//! the reported error), and `Open -> Closed(Cancelled)` on cancel or back.

use serde::{Deserialize, Serialize};

/// Why a frame was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// The draft was committed.
    Committed,
    /// The author cancelled or navigated back.
    Cancelled,
    /// A frame below was committed or closed, taking this one with it.
    Superseded,
}

/// Categories of commit failure, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitErrorKind {
    /// The save would introduce a reference cycle.
    CircularReference,
    /// The store rejected or failed the save.
    Persistence,
    /// The draft failed validation before reaching the store.
    Validation,
}

/// Represents the current state of an editor frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FrameState {
    /// Draft is editable.
    #[default]
    Open,

    /// Commit in flight; the draft is read-only until it settles.
    Saving,

    /// The last commit failed. The draft is kept and editable.
    Failed {
        /// Error category for display.
        kind: CommitErrorKind,
        /// Human-readable error message.
        message: String,
        /// Optional technical details (for example, the cycle path).
        details: Option<String>,
    },

    /// Frame is gone from the stack.
    Closed {
        /// How it was closed.
        reason: CloseReason,
    },
}

impl FrameState {
    /// Creates a Failed state.
    #[must_use]
    pub fn failed(kind: CommitErrorKind, message: impl Into<String>) -> Self {
        Self::Failed {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Creates a Failed state with details.
    #[must_use]
    pub fn failed_with_details(
        kind: CommitErrorKind,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self::Failed {
            kind,
            message: message.into(),
            details: Some(details.into()),
        }
    }

    /// Returns true if the draft may be edited or committed.
    #[must_use]
    pub const fn is_editable(&self) -> bool {
        matches!(self, Self::Open | Self::Failed { .. })
    }

    /// Returns true while a commit is in flight.
    #[must_use]
    pub const fn is_saving(&self) -> bool {
        matches!(self, Self::Saving)
    }

    /// Returns true once the frame left the stack.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed { .. })
    }

    /// Returns the error message if the last commit failed.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Failed { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Returns the error kind if the last commit failed.
    #[must_use]
    pub const fn error_kind(&self) -> Option<CommitErrorKind> {
        match self {
            Self::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_open() {
        let state = FrameState::default();
        assert!(state.is_editable());
        assert!(!state.is_saving());
    }

    #[test]
    fn test_failed_is_still_editable() {
        let state = FrameState::failed(CommitErrorKind::Persistence, "store unavailable");
        assert!(state.is_editable());
        assert_eq!(state.error_message(), Some("store unavailable"));
        assert_eq!(state.error_kind(), Some(CommitErrorKind::Persistence));
    }

    #[test]
    fn test_saving_and_closed_are_not_editable() {
        assert!(!FrameState::Saving.is_editable());
        let closed = FrameState::Closed {
            reason: CloseReason::Cancelled,
        };
        assert!(!closed.is_editable());
        assert!(closed.is_closed());
    }

    #[test]
    fn test_serialization_tag() {
        let state = FrameState::failed_with_details(
            CommitErrorKind::CircularReference,
            "circular reference",
            "a -> b -> a",
        );
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"state\":\"failed\""));
        assert!(json.contains("\"kind\":\"circular_reference\""));
    }
}
