//! Weft Infrastructure - Adapters and implementations
//!
//! This crate provides concrete implementations of the ports defined in the
//! application layer, plus the settings and snapshot files the CLI uses.

pub mod adapters;
pub mod persistence;
pub mod serialization;

pub use adapters::{HttpStringStore, InMemoryStringStore};
pub use persistence::{
    SettingsError, SettingsRepository, SnapshotError, load_snapshot, load_valid_snapshot,
    save_snapshot,
};
pub use serialization::{
    SerializationError, from_json, from_json_bytes, from_yaml, to_json_stable,
    to_json_stable_bytes,
};
