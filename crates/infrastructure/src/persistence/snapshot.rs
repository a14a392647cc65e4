//! Project snapshot files.
//!
//! A snapshot is the JSON body of `GET /api/projects/{id}/` in the domain
//! shape. Files ending in `.yaml` or `.yml` are read as YAML.

use std::path::Path;

use tokio::fs;
use weft_domain::{DomainError, Project};

use crate::serialization::{SerializationError, from_json_bytes, from_yaml, to_json_stable_bytes};

/// Error type for snapshot files.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// IO error during file operations.
    #[error("IO error reading {path}: {source}")]
    Io {
        /// The file.
        path: String,
        /// The underlying error.
        source: std::io::Error,
    },

    /// The file does not hold a project.
    #[error("Invalid snapshot {path}: {source}")]
    Format {
        /// The file.
        path: String,
        /// The underlying error.
        source: SerializationError,
    },

    /// Two nodes share an effective name.
    #[error("Invalid snapshot: {0}")]
    Invalid(#[from] DomainError),
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
}

/// Reads a project snapshot from JSON or YAML.
///
/// Duplicate effective names are not rejected here; use
/// [`load_valid_snapshot`] when they must be.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub async fn load_snapshot(path: &Path) -> Result<Project, SnapshotError> {
    let display = path.display().to_string();
    let bytes = fs::read(path).await.map_err(|source| SnapshotError::Io {
        path: display.clone(),
        source,
    })?;

    let parsed = if is_yaml(path) {
        String::from_utf8(bytes)
            .map_err(SerializationError::from)
            .and_then(|text| from_yaml(&text))
    } else {
        from_json_bytes(&bytes)
    };
    parsed.map_err(|source| SnapshotError::Format {
        path: display,
        source,
    })
}

/// Reads a project snapshot and checks that effective names are unique.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or names collide.
pub async fn load_valid_snapshot(path: &Path) -> Result<Project, SnapshotError> {
    let project = load_snapshot(path).await?;
    project.validate_unique_names()?;
    Ok(project)
}

/// Writes a project snapshot as stable JSON.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub async fn save_snapshot(path: &Path, project: &Project) -> Result<(), SnapshotError> {
    let display = path.display().to_string();
    let bytes = to_json_stable_bytes(project).map_err(|source| SnapshotError::Format {
        path: display.clone(),
        source,
    })?;
    fs::write(path, bytes)
        .await
        .map_err(|source| SnapshotError::Io { path: display, source })
}
