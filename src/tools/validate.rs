//! Argument validation against a [`ToolSchema`] (spec §4.3).
//!
//! Checked before a tool ever runs: every declared required parameter is
//! present, every present parameter's JSON type matches its declared
//! [`ParamType`], enum-constrained parameters hold a declared member, and no
//! argument outside the declared set is present.

use crate::provider::{ParamType, ToolSchema};

pub fn validate_arguments(schema: &ToolSchema, arguments: &serde_json::Value) -> Result<(), String> {
    let obj = arguments
        .as_object()
        .ok_or_else(|| "invalid_arguments: expected a JSON object".to_string())?;

    let declared: std::collections::HashSet<&str> = schema.parameters.iter().map(|p| p.name.as_str()).collect();
    for key in obj.keys() {
        if !declared.contains(key.as_str()) {
            return Err(format!("invalid_arguments: unexpected argument '{key}'"));
        }
    }

    for param in &schema.parameters {
        match obj.get(&param.name) {
            Some(value) => {
                if !type_matches(&param.param_type, value) {
                    return Err(format!(
                        "invalid_arguments: '{}' must be of type {:?}",
                        param.name, param.param_type
                    ));
                }
                if let Some(allowed) = &param.enum_values {
                    if let Some(s) = value.as_str() {
                        if !allowed.iter().any(|a| a == s) {
                            return Err(format!(
                                "invalid_arguments: '{}' must be one of {:?}",
                                param.name, allowed
                            ));
                        }
                    }
                }
            }
            None if param.required => {
                return Err(format!("invalid_arguments: missing required argument '{}'", param.name));
            }
            None => {}
        }
    }

    Ok(())
}

fn type_matches(param_type: &ParamType, value: &serde_json::Value) -> bool {
    match param_type {
        ParamType::String => value.is_string(),
        ParamType::Number => value.is_number(),
        ParamType::Boolean => value.is_boolean(),
        ParamType::Array => value.is_array(),
        ParamType::Object => value.is_object(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ToolParameter;

    fn schema() -> ToolSchema {
        ToolSchema {
            name: "t".into(),
            description: "d".into(),
            parameters: vec![
                ToolParameter {
                    name: "path".into(),
                    param_type: ParamType::String,
                    description: "".into(),
                    required: true,
                    default: None,
                    enum_values: None,
                },
                ToolParameter {
                    name: "mode".into(),
                    param_type: ParamType::String,
                    description: "".into(),
                    required: false,
                    default: None,
                    enum_values: Some(vec!["a".into(), "b".into()]),
                },
            ],
            category: "fs".into(),
            dangerous: false,
            side_effect_free: true,
        }
    }

    #[test]
    fn rejects_missing_required() {
        let err = validate_arguments(&schema(), &serde_json::json!({})).unwrap_err();
        assert!(err.contains("missing required"));
    }

    #[test]
    fn rejects_wrong_type() {
        let err = validate_arguments(&schema(), &serde_json::json!({"path": 5})).unwrap_err();
        assert!(err.contains("must be of type"));
    }

    #[test]
    fn rejects_unknown_extra() {
        let err = validate_arguments(&schema(), &serde_json::json!({"path": "x", "extra": 1})).unwrap_err();
        assert!(err.contains("unexpected argument"));
    }

    #[test]
    fn rejects_bad_enum_member() {
        let err = validate_arguments(&schema(), &serde_json::json!({"path": "x", "mode": "z"})).unwrap_err();
        assert!(err.contains("must be one of"));
    }

    #[test]
    fn accepts_valid_arguments() {
        assert!(validate_arguments(&schema(), &serde_json::json!({"path": "x", "mode": "a"})).is_ok());
    }
}
