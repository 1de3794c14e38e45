//! Lightweight structural validation of tool arguments/results against a
//! descriptor's `input_schema`/`output_schema`.
//!
//! Descriptors carry schemas as a `serde_json::Value` shaped like
//! `{"required": ["field", ...], "properties": {"field": "string"|"number"|"bool"|"object"|"array"|"any"}}`.
//! This is deliberately not a full JSON-Schema implementation — the
//! orchestrator only needs "does this call conform to what the tool
//! declared", not general-purpose schema validation.

use serde_json::Value;

/// A structural mismatch between a value and a descriptor's schema.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SchemaError {
    #[error("value is not a JSON object")]
    NotAnObject,
    #[error("missing required field `{0}`")]
    MissingField(String),
    #[error("field `{field}` expected type `{expected}`, found `{found}`")]
    WrongType {
        field: String,
        expected: String,
        found: String,
    },
}

/// Validate `value` against `schema`. An empty or absent schema (anything
/// that isn't a JSON object with a `required`/`properties` shape) is
/// treated as "accepts anything" — this keeps the registry usable for
/// tools whose authors haven't yet tightened their schema.
pub fn validate(value: &Value, schema: &Value) -> Result<(), SchemaError> {
    let Some(schema_obj) = schema.as_object() else {
        return Ok(());
    };

    let required = schema_obj
        .get("required")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).collect::<Vec<_>>())
        .unwrap_or_default();
    let properties = schema_obj.get("properties").and_then(Value::as_object);

    if required.is_empty() && properties.is_none() {
        return Ok(());
    }

    let obj = value.as_object().ok_or(SchemaError::NotAnObject)?;

    for field in &required {
        if !obj.contains_key(*field) {
            return Err(SchemaError::MissingField((*field).to_string()));
        }
    }

    if let Some(properties) = properties {
        for (field, expected_type) in properties {
            let Some(found) = obj.get(field) else {
                continue;
            };
            let Some(expected) = expected_type.as_str() else {
                continue;
            };
            if expected == "any" {
                continue;
            }
            if !type_matches(found, expected) {
                return Err(SchemaError::WrongType {
                    field: field.clone(),
                    expected: expected.to_string(),
                    found: json_type_name(found).to_string(),
                });
            }
        }
    }

    Ok(())
}

fn type_matches(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "bool" | "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Value {
        json!({
            "required": ["asset_id"],
            "properties": {"asset_id": "string", "force": "bool"}
        })
    }

    #[test]
    fn accepts_conforming_value() {
        assert!(validate(&json!({"asset_id": "i-1", "force": true}), &schema()).is_ok());
    }

    #[test]
    fn rejects_missing_required_field() {
        assert!(matches!(
            validate(&json!({"force": true}), &schema()),
            Err(SchemaError::MissingField(f)) if f == "asset_id"
        ));
    }

    #[test]
    fn rejects_wrong_type() {
        assert!(matches!(
            validate(&json!({"asset_id": 5}), &schema()),
            Err(SchemaError::WrongType { .. })
        ));
    }

    #[test]
    fn empty_schema_accepts_anything() {
        assert!(validate(&json!({"whatever": 1}), &json!({})).is_ok());
    }
}
