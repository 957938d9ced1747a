//! JSON schema for [`QueryRequestV1`](crate::request::QueryRequestV1).

use serde_json::json;

use crate::hierarchy::HierarchyOperator;
use crate::request::QUERY_REQUEST_V1_VERSION;

/// Hand-written schema for tool definitions.
///
/// It lists the canonical field names and the aliases the parser accepts.
/// It documents the shape for callers. Requests are still validated by
/// [`QueryRequestV1::validate`](crate::request::QueryRequestV1::validate),
/// never by this schema.
pub fn query_request_v1_json_schema() -> serde_json::Value {
    let operators = HierarchyOperator::ALL
        .iter()
        .map(|op| op.as_str())
        .collect::<Vec<_>>();

    json!({
        "type": "object",
        "properties": {
            "version": { "type": "integer", "const": QUERY_REQUEST_V1_VERSION },
            "entity": { "type": "string", "enum": ["block", "page"] },
            "conditions": { "type": "array", "items": { "$ref": "#/$defs/condition" } },
            "combinator": { "$ref": "#/$defs/combinator" },
            "groups": { "type": "array", "items": { "$ref": "#/$defs/group" } },
            "group_combinator": { "$ref": "#/$defs/combinator" },
            "hierarchy": {
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "left": { "$ref": "#/$defs/group_set" },
                    "operator": { "type": "string", "enum": operators },
                    "right": { "$ref": "#/$defs/group_set" }
                },
                "required": ["left", "operator", "right"]
            },
            "scope": {
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "block_ids": { "type": "array", "items": { "type": "string" } },
                    "page_ids": { "type": "array", "items": { "type": "string" } },
                    "exclude_journals": { "type": "boolean" }
                }
            }
        },
        "oneOf": [
            { "required": ["conditions"] },
            { "required": ["groups"] },
            { "required": ["hierarchy"] }
        ],
        "$defs": {
            "combinator": {
                "description": "Case-insensitive. Defaults to AND.",
                "type": "string",
                "enum": ["AND", "OR", "and", "or"]
            },
            "condition": {
                "type": "object",
                "properties": {
                    "type": {
                        "description": "Alias: kind. Unknown kinds are treated as text.",
                        "type": "string",
                        "enum": ["text", "page_reference", "block_reference", "pattern"]
                    },
                    "value": { "type": "string", "minLength": 1 },
                    "match_mode": {
                        "description": "Alias: match. Defaults to contains (pattern for kind pattern).",
                        "type": "string",
                        "enum": ["exact", "contains", "pattern"]
                    },
                    "negate": { "type": "boolean" },
                    "weight": { "type": "number" },
                    "semantic_expansion": {
                        "description": "Strategy tag for the term expansion service.",
                        "type": "string"
                    }
                },
                "required": ["value"]
            },
            "group": {
                "type": "object",
                "properties": {
                    "conditions": {
                        "type": "array",
                        "minItems": 1,
                        "items": { "$ref": "#/$defs/condition" }
                    },
                    "combinator": { "$ref": "#/$defs/combinator" }
                },
                "required": ["conditions"]
            },
            "group_set": {
                "type": "object",
                "properties": {
                    "conditions": { "type": "array", "items": { "$ref": "#/$defs/condition" } },
                    "combinator": { "$ref": "#/$defs/combinator" },
                    "groups": { "type": "array", "items": { "$ref": "#/$defs/group" } },
                    "group_combinator": { "$ref": "#/$defs/combinator" }
                },
                "oneOf": [
                    { "required": ["conditions"] },
                    { "required": ["groups"] }
                ]
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_lists_every_operator() {
        let schema = query_request_v1_json_schema();
        let ops = schema["properties"]["hierarchy"]["properties"]["operator"]["enum"]
            .as_array()
            .expect("operator enum");
        assert_eq!(ops.len(), HierarchyOperator::ALL.len());
        assert!(ops.iter().any(|o| o == "linked_parent_of"));
    }

    #[test]
    fn schema_version_matches_parser() {
        let schema = query_request_v1_json_schema();
        assert_eq!(schema["properties"]["version"]["const"], QUERY_REQUEST_V1_VERSION);
    }
}
