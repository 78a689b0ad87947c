//! Shallow JSON Schema checks for capability arguments.

use crate::preview;

/// Check `input` against the object schema: required keys present, declared
/// property types matched. `type` may be a single name or a list of names.
pub fn validate_against_schema(
    input: &serde_json::Value,
    schema: &serde_json::Value,
) -> Result<(), String> {
    if !input.is_object() {
        return Err(format!("arguments must be an object, got {}", preview(&input.to_string(), 80)));
    }

    if let Some(required) = schema.get("required").and_then(|v| v.as_array()) {
        for key in required.iter().filter_map(|v| v.as_str()) {
            if input.get(key).is_none_or(|v| v.is_null()) {
                return Err(format!("missing required argument '{key}'"));
            }
        }
    }

    if let Some(props) = schema.get("properties").and_then(|v| v.as_object()) {
        for (key, prop_schema) in props {
            let Some(value) = input.get(key) else { continue };
            if value.is_null() {
                continue;
            }
            let ok = match prop_schema.get("type") {
                Some(serde_json::Value::String(t)) => matches_json_type(value, t),
                Some(serde_json::Value::Array(types)) => types
                    .iter()
                    .filter_map(|t| t.as_str())
                    .any(|t| matches_json_type(value, t)),
                _ => true,
            };
            if !ok {
                return Err(format!(
                    "argument '{key}' has the wrong type: {}",
                    preview(&value.to_string(), 80)
                ));
            }
        }
    }

    Ok(())
}

fn matches_json_type(value: &serde_json::Value, type_name: &str) -> bool {
    match type_name {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.as_i64().is_some() || value.as_u64().is_some(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "roadmap": { "type": ["array", "string"] },
                "hours_per_day": { "type": "integer" }
            },
            "required": ["roadmap"]
        })
    }

    #[test]
    fn accepts_either_listed_type() {
        assert!(validate_against_schema(&json!({"roadmap": []}), &schema()).is_ok());
        assert!(validate_against_schema(&json!({"roadmap": "[]"}), &schema()).is_ok());
    }

    #[test]
    fn rejects_missing_and_mistyped() {
        assert!(validate_against_schema(&json!({}), &schema()).unwrap_err().contains("roadmap"));
        assert!(validate_against_schema(&json!({"roadmap": null}), &schema()).is_err());
        assert!(validate_against_schema(&json!({"roadmap": [], "hours_per_day": 1.5}), &schema()).is_err());
        assert!(validate_against_schema(&json!("text"), &schema()).is_err());
    }

    #[test]
    fn optional_null_is_ignored() {
        assert!(validate_against_schema(&json!({"roadmap": [], "hours_per_day": null}), &schema()).is_ok());
    }
}
