//! Weft Application - Use cases and ports
//!
//! This crate holds the editor engine: reference extraction and resolution,
//! spawn ordering, cycle detection, the commit pipeline and the cascading
//! drawer of editor frames. Storage is reached only through the ports.

pub mod drawer;
pub mod error;
pub mod graph;
pub mod ports;
pub mod use_cases;
pub mod variable_resolver;

#[cfg(test)]
mod test_support;

pub use error::{ApplicationError, ApplicationResult};
