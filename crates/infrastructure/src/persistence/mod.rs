//! File-backed persistence: settings and project snapshots.

mod settings_repository;
mod snapshot;

pub use settings_repository::{
    ENV_API_URL, ENV_LOG, ENV_TIMEOUT_SECS, SettingsError, SettingsRepository,
};
pub use snapshot::{SnapshotError, load_snapshot, load_valid_snapshot, save_snapshot};
