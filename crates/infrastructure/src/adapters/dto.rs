//! Wire shapes of the REST backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use weft_domain::{
    Dimension, DimensionId, DimensionValue, DimensionValueId, NodeDimensionValue, NodeId, Project,
    ProjectId, StringNode,
};

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StringDto {
    pub id: u64,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub variable_name: Option<String>,
    pub variable_hash: String,
    #[serde(default)]
    pub effective_variable_name: Option<String>,
    #[serde(default)]
    pub is_conditional_container: bool,
    #[serde(default)]
    pub dimension_values: Vec<StringDimensionValueDto>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl StringDto {
    /// The name content references this node by.
    pub fn effective_name(&self) -> &str {
        self.effective_variable_name
            .as_deref()
            .or(self.variable_name.as_deref())
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.variable_hash)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StringDimensionValueDto {
    pub dimension_value: u64,
    #[serde(default)]
    pub dimension_value_detail: Option<DimensionValueDetailDto>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DimensionValueDetailDto {
    pub value: String,
    pub dimension: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DimensionValueDto {
    pub id: u64,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DimensionDto {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub values: Vec<DimensionValueDto>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ProjectDto {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub strings: Vec<StringDto>,
    #[serde(default)]
    pub dimensions: Vec<DimensionDto>,
}

#[derive(Debug, Serialize)]
pub(crate) struct StringPayload<'a> {
    pub content: &'a str,
    pub variable_name: Option<&'a str>,
    pub is_conditional: bool,
    pub is_conditional_container: bool,
    pub project: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct DimensionPayload<'a> {
    pub name: &'a str,
    pub project: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct DimensionValuePayload<'a> {
    pub dimension: u64,
    pub value: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct LinkPayload {
    pub string: u64,
    pub dimension_value: u64,
}

impl From<StringDto> for StringNode {
    fn from(dto: StringDto) -> Self {
        // Older rows echo the hash into variable_name; that is not a custom name.
        let variable_name = dto
            .variable_name
            .filter(|n| !n.is_empty() && *n != dto.variable_hash);

        Self {
            id: NodeId(dto.id),
            content: dto.content,
            variable_name,
            variable_hash: dto.variable_hash,
            is_conditional_container: dto.is_conditional_container,
            dimension_values: dto
                .dimension_values
                .into_iter()
                .filter_map(|link| {
                    link.dimension_value_detail.map(|detail| NodeDimensionValue {
                        dimension_value: DimensionValueId(link.dimension_value),
                        dimension: DimensionId(detail.dimension),
                        value: detail.value,
                    })
                })
                .collect(),
            created_at: dto.created_at,
        }
    }
}

impl From<DimensionDto> for Dimension {
    fn from(dto: DimensionDto) -> Self {
        Self {
            id: DimensionId(dto.id),
            name: dto.name,
            values: dto
                .values
                .into_iter()
                .map(|v| DimensionValue::new(DimensionValueId(v.id), v.value))
                .collect(),
        }
    }
}

impl From<ProjectDto> for Project {
    fn from(dto: ProjectDto) -> Self {
        Self {
            id: ProjectId(dto.id),
            name: dto.name,
            strings: dto.strings.into_iter().map(StringNode::from).collect(),
            dimensions: dto.dimensions.into_iter().map(Dimension::from).collect(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PROJECT: &str = r#"{
        "id": 3,
        "name": "Checkout",
        "strings": [
            {
                "id": 11,
                "content": "Pay {{amount}}",
                "project": 3,
                "variable_name": "pay",
                "variable_hash": "k2j9",
                "effective_variable_name": "pay",
                "is_conditional": false,
                "is_conditional_container": false,
                "dimension_values": [
                    {
                        "id": 1,
                        "string": 11,
                        "dimension_value": 40,
                        "created_at": "2025-07-11T07:14:00Z",
                        "dimension_value_detail": {"id": 40, "value": "pay", "dimension": 7}
                    }
                ],
                "created_at": "2025-07-11T07:14:00Z",
                "updated_at": "2025-07-11T07:14:00Z"
            },
            {"id": 12, "content": "$5", "variable_name": "z8x1", "variable_hash": "z8x1"}
        ],
        "dimensions": [
            {"id": 7, "name": "method", "values": [{"id": 40, "value": "pay", "dimension": 7}]}
        ]
    }"#;

    #[test]
    fn test_project_conversion() {
        let dto: ProjectDto = serde_json::from_str(PROJECT).unwrap();
        let project = Project::from(dto);

        assert_eq!(project.id, ProjectId(3));
        let pay = project.node(NodeId(11)).unwrap();
        assert_eq!(pay.effective_name(), "pay");
        assert_eq!(
            pay.dimension_values,
            vec![NodeDimensionValue {
                dimension_value: DimensionValueId(40),
                dimension: DimensionId(7),
                value: "pay".to_string(),
            }]
        );
        assert!(pay.created_at.is_some());
        assert_eq!(project.dimensions[0].values[0].value, "pay");
    }

    #[test]
    fn test_hash_echoed_as_name_is_not_a_custom_name() {
        let dto: ProjectDto = serde_json::from_str(PROJECT).unwrap();
        let project = Project::from(dto);
        assert_eq!(project.node(NodeId(12)).unwrap().variable_name, None);
    }

    #[test]
    fn test_effective_name_fallbacks() {
        let dto: StringDto =
            serde_json::from_str(r#"{"id": 1, "variable_name": "", "variable_hash": "h"}"#).unwrap();
        assert_eq!(dto.effective_name(), "h");
    }

    #[test]
    fn test_payload_shape() {
        let payload = StringPayload {
            content: "x",
            variable_name: None,
            is_conditional: true,
            is_conditional_container: true,
            project: 3,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["variable_name"], serde_json::Value::Null);
        assert_eq!(json["is_conditional_container"], true);
        assert_eq!(json["project"], 3);
    }
}
