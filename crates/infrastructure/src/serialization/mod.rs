//! Serialization for snapshot and settings files.
//!
//! JSON output is deterministic so that files written by Weft diff cleanly:
//! 2-space indentation, a trailing newline, fields in declaration order.
//! YAML is accepted as input for hand-written snapshots.

mod json;
mod yaml;

pub use json::*;
pub use yaml::from_yaml;
