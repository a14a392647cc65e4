//! Editor settings.
//!
//! Every field has a default so a partial (or missing) settings file is valid.

use serde::{Deserialize, Serialize};

use crate::draft::{DEFAULT_SPAWN_CONTENT, NEW_SPAWN_CONTENT};

/// Default depth limit when expanding nested references for display.
pub const DEFAULT_MAX_RENDER_DEPTH: usize = 10;

/// Settings for the editor engine and its store adapters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorSettings {
    /// Base URL of the REST backend.
    pub api_base_url: String,

    /// Request timeout for store calls, in seconds.
    pub request_timeout_secs: u64,

    /// Maximum nesting depth when rendering content.
    pub max_render_depth: usize,

    /// Content of the spawn seeded into a new conditional.
    pub default_spawn_content: String,

    /// Content of a spawn appended interactively.
    pub new_spawn_content: String,

    /// Content given to variables created because content referenced them.
    pub materialized_content: String,

    /// Content saved for a plain variable left blank and without a name.
    pub empty_content_fallback: String,

    /// Default `tracing` filter directive.
    pub log_filter: String,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            request_timeout_secs: 30,
            max_render_depth: DEFAULT_MAX_RENDER_DEPTH,
            default_spawn_content: DEFAULT_SPAWN_CONTENT.to_string(),
            new_spawn_content: NEW_SPAWN_CONTENT.to_string(),
            materialized_content: "New string content".to_string(),
            empty_content_fallback: "New string content".to_string(),
            log_filter: "info".to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_fill_defaults() {
        let settings: EditorSettings =
            serde_json::from_str(r#"{"api_base_url": "https://copy.example.com"}"#).unwrap();
        assert_eq!(settings.api_base_url, "https://copy.example.com");
        assert_eq!(settings.max_render_depth, DEFAULT_MAX_RENDER_DEPTH);
        assert_eq!(settings.default_spawn_content, DEFAULT_SPAWN_CONTENT);
    }

    #[test]
    fn test_empty_object_is_default() {
        let settings: EditorSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, EditorSettings::default());
    }
}
