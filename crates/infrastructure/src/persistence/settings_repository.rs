//! Editor settings persistence.
//!
//! Settings live in the platform-specific config directory:
//! - Linux: ~/.config/weft/settings.json
//! - macOS: ~/Library/Application Support/weft/settings.json
//! - Windows: %APPDATA%/weft/settings.json
//!
//! A few fields can be overridden from the environment, see
//! [`SettingsRepository::apply_overrides`].

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;
use weft_domain::EditorSettings;

use crate::serialization::{SerializationError, from_json_bytes, to_json_stable_bytes};

/// Overrides the REST backend URL.
pub const ENV_API_URL: &str = "WEFT_API_URL";
/// Overrides the default log filter.
pub const ENV_LOG: &str = "WEFT_LOG";
/// Overrides the request timeout, in seconds.
pub const ENV_TIMEOUT_SECS: &str = "WEFT_TIMEOUT_SECS";

/// Error type for settings operations.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    /// Could not determine config directory.
    #[error("Could not determine config directory")]
    NoConfigDir,

    /// An environment override has an unusable value.
    #[error("Invalid value for {key}: {value:?}")]
    InvalidOverride {
        /// The variable name.
        key: &'static str,
        /// The rejected value.
        value: String,
    },
}

/// Loads and saves [`EditorSettings`].
#[derive(Debug, Clone)]
pub struct SettingsRepository {
    path: Option<PathBuf>,
}

impl Default for SettingsRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsRepository {
    /// Creates a repository over the platform settings file.
    #[must_use]
    pub fn new() -> Self {
        Self {
            path: dirs::config_dir().map(|p| p.join("weft").join("settings.json")),
        }
    }

    /// Creates a repository over an explicit settings file.
    #[must_use]
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Returns the settings file path, if one could be determined.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Loads the settings file and applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if an override is invalid.
    pub async fn load(&self) -> Result<EditorSettings, SettingsError> {
        let mut settings = self.load_file().await?;
        Self::apply_overrides(&mut settings, |key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Loads the settings file alone. Returns defaults if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load_file(&self) -> Result<EditorSettings, SettingsError> {
        let Some(path) = &self.path else {
            return Ok(EditorSettings::default());
        };

        if !fs::try_exists(path).await? {
            debug!(path = %path.display(), "No settings file, using defaults");
            return Ok(EditorSettings::default());
        }

        let content = fs::read(path).await?;
        Ok(from_json_bytes(&content)?)
    }

    /// Saves settings to disk, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory is unknown or the write fails.
    pub async fn save(&self, settings: &EditorSettings) -> Result<(), SettingsError> {
        let Some(path) = &self.path else {
            return Err(SettingsError::NoConfigDir);
        };

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await?;
        }
        fs::write(path, to_json_stable_bytes(settings)?).await?;
        Ok(())
    }

    /// Applies `WEFT_API_URL`, `WEFT_LOG` and `WEFT_TIMEOUT_SECS` as found by
    /// `lookup`. Empty values are ignored.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::InvalidOverride` if the timeout is not a
    /// positive integer.
    pub fn apply_overrides(
        settings: &mut EditorSettings,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), SettingsError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(ENV_API_URL) {
            settings.api_base_url = url;
        }
        if let Some(filter) = get(ENV_LOG) {
            settings.log_filter = filter;
        }
        if let Some(raw) = get(ENV_TIMEOUT_SECS) {
            settings.request_timeout_secs = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(SettingsError::InvalidOverride {
                    key: ENV_TIMEOUT_SECS,
                    value: raw,
                })?;
        }
        Ok(())
    }
}
