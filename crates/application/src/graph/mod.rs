//! Reference graph analysis
//!
//! Spawn ordering and cycle detection over a project snapshot.

pub mod cycle;
pub mod spawns;

pub use cycle::{CandidateSpawn, CycleCandidate, CyclePath, find_cycle, would_cycle};
pub use spawns::{SpawnSet, compare_spawns, order_spawns, spawn_ordinal, spawns_of};
