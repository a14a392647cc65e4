//! YAML input.

use serde::de::DeserializeOwned;

use super::SerializationError;

/// Deserializes YAML from a string.
///
/// # Errors
///
/// Returns an error if the YAML is invalid or doesn't match the expected type.
pub fn from_yaml<T: DeserializeOwned>(yaml: &str) -> Result<T, SerializationError> {
    Ok(serde_yaml::from_str(yaml)?)
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use weft_domain::{HIDDEN_VALUE, Project};

    #[test]
    fn test_yaml_snapshot() {
        let yaml = r"
id: 2
name: shop
strings:
  - id: 1
    content: ''
    variable_name: tier
    variable_hash: t1
    is_conditional_container: true
dimensions:
  - id: 9
    name: tier
    values:
      - id: 1
        value: Hidden
";
        let project: Project = from_yaml(yaml).expect("yaml should parse");
        assert_eq!(project.strings[0].effective_name(), "tier");
        assert_eq!(project.dimensions[0].values[0].value, HIDDEN_VALUE);
    }
}
