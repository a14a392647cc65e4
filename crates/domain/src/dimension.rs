//! Dimensions: the named axes that select among a container's spawns.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Reserved dimension value that hides a conditional container entirely.
pub const HIDDEN_VALUE: &str = "Hidden";

/// Identity of a dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DimensionId(pub u64);

impl fmt::Display for DimensionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a dimension value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DimensionValueId(pub u64);

impl fmt::Display for DimensionValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One possible value of a dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionValue {
    /// Value identity.
    pub id: DimensionValueId,
    /// Value text.
    pub value: String,
}

impl DimensionValue {
    /// Creates a new dimension value.
    #[must_use]
    pub fn new(id: DimensionValueId, value: impl Into<String>) -> Self {
        Self {
            id,
            value: value.into(),
        }
    }

    /// Returns true if this is the reserved `"Hidden"` value.
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.value == HIDDEN_VALUE
    }
}

/// A named axis with an ordered list of values.
///
/// A dimension whose name equals a conditional container's effective name
/// is that container's spawn dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    /// Dimension identity.
    pub id: DimensionId,
    /// Dimension name.
    pub name: String,
    /// Ordered values.
    #[serde(default)]
    pub values: Vec<DimensionValue>,
}

impl Dimension {
    /// Creates a dimension with no values.
    #[must_use]
    pub fn new(id: DimensionId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            values: Vec::new(),
        }
    }

    /// Appends a value.
    #[must_use]
    pub fn with_value(mut self, value: DimensionValue) -> Self {
        self.values.push(value);
        self
    }

    /// Returns true if one of the values is literally `"Hidden"`.
    #[must_use]
    pub fn has_hidden_value(&self) -> bool {
        self.values.iter().any(DimensionValue::is_hidden)
    }

    /// Returns the value with the given text.
    #[must_use]
    pub fn value_named(&self, value: &str) -> Option<&DimensionValue> {
        self.values.iter().find(|v| v.value == value)
    }
}
