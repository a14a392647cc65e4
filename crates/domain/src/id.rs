//! ID generation utilities.

use uuid::Uuid;

/// Generates a new draft key.
///
/// Draft keys identify uncommitted drafts (and their spawn slots) inside an
/// editor session. They are never sent to the store. UUID v7 keeps them
/// sortable by creation time.
#[must_use]
pub fn generate_draft_key() -> String {
    format!("temp-{}", Uuid::now_v7())
}

/// Returns true if the key was produced by [`generate_draft_key`].
#[must_use]
pub fn is_draft_key(key: &str) -> bool {
    key.starts_with("temp-")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_draft_key_format() {
        let key = generate_draft_key();
        assert!(is_draft_key(&key));
        // "temp-" + 36 chars of UUID
        assert_eq!(key.len(), 41);
        assert!(Uuid::parse_str(&key["temp-".len()..]).is_ok());
    }

    #[test]
    fn test_generate_draft_key_uniqueness() {
        let key1 = generate_draft_key();
        let key2 = generate_draft_key();
        assert_ne!(key1, key2);
    }

    #[test]
    fn test_is_draft_key_rejects_other_ids() {
        assert!(!is_draft_key("42"));
        assert!(!is_draft_key("welcome_title"));
    }
}
