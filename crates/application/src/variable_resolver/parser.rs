//! Reference parser for `{{name}}` syntax
//!
//! A reference is `{{`, one or more characters none of which is `}`, then
//! `}}`. Names are taken verbatim: surrounding whitespace is part of the
//! name, but a name made only of whitespace is not a reference.

use std::collections::HashSet;
use std::ops::Range;

/// A reference found in a piece of content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// The referenced name (without `{{ }}`).
    pub name: String,

    /// Byte range in the original string, braces included.
    pub span: Range<usize>,
}

impl Reference {
    /// Creates a new reference.
    #[must_use]
    pub fn new(name: impl Into<String>, span: Range<usize>) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }
}

/// Parses content and returns every reference in order of appearance,
/// duplicates included.
///
/// # Examples
///
/// ```
/// use weft_application::variable_resolver::parse_references;
///
/// let refs = parse_references("Hi {{user}}, {{user}}!");
/// assert_eq!(refs.len(), 2);
/// assert_eq!(refs[0].name, "user");
/// assert_eq!(refs[0].span, 3..11);
/// ```
#[must_use]
pub fn parse_references(input: &str) -> Vec<Reference> {
    let mut references = Vec::new();
    let mut cursor = 0;

    while let Some(offset) = input[cursor..].find("{{") {
        let start = cursor + offset;
        let name_start = start + 2;

        let Some(len) = input[name_start..].find('}') else {
            // no closing brace anywhere after this point
            break;
        };

        let name_end = name_start + len;
        if len > 0 && input[name_end..].starts_with("}}") {
            let name = &input[name_start..name_end];
            if !name.trim().is_empty() {
                references.push(Reference::new(name, start..name_end + 2));
            }
            cursor = name_end + 2;
        } else {
            // `{` is one byte, so this stays on a char boundary
            cursor = start + 1;
        }
    }

    references
}

/// Returns the distinct names referenced by `input`, in first-seen order.
#[must_use]
pub fn extract_references(input: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    parse_references(input)
        .into_iter()
        .filter(|r| seen.insert(r.name.clone()))
        .map(|r| r.name)
        .collect()
}

/// Returns true if the input contains at least one reference.
#[must_use]
pub fn has_references(input: &str) -> bool {
    input.contains("{{") && !parse_references(input).is_empty()
}
