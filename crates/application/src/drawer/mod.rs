//! Cascading drawer editor
//!
//! A stack of editor frames, each owning one draft. Frames open on top of
//! each other for referenced variables and for spawns, and close back down
//! on commit or cancel.

mod frame;
mod session;
mod stack;

pub use frame::{Frame, FrameId, FrameOptions, FrameOrigin, SuccessCallback};
pub use session::{DrawerSession, SessionError};
pub use stack::{DrawerError, DrawerStack, Settled};
