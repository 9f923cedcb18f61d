//! Registration-time checks for tool schemas and implementation signatures.
//!
//! Both checks are pure: they read their input and return a typed result.

use super::schema::{ObjectSchema, PropertyKind, PropertySchema, ToolSchema};
use super::traits::{Signature, ValueKind};
use crate::error::{SchemaError, SignatureError};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Keywords outside the portable subset understood by every model.
pub const UNSUPPORTED_KEYWORDS: &[&str] = &["oneOf", "minimum", "default"];

/// Require the "one argument map in, one string out" convention.
pub fn validate_signature(tool: &str, signature: &Signature) -> Result<(), SignatureError> {
    if signature.params.len() != 1 {
        return Err(SignatureError::Arity {
            tool: tool.to_string(),
            arity: signature.params.len(),
        });
    }
    if signature.params[0] != ValueKind::ArgMap {
        return Err(SignatureError::ArgumentNotMap {
            tool: tool.to_string(),
        });
    }
    if signature.returns != ValueKind::Text {
        return Err(SignatureError::ReturnNotText {
            tool: tool.to_string(),
        });
    }
    Ok(())
}

/// Validate a wire-format schema registered under `expected_name`.
pub fn validate_schema(schema: &Value, expected_name: &str) -> Result<ToolSchema, SchemaError> {
    parse_schema(schema, Some(expected_name))
}

pub(crate) fn parse_schema(
    schema: &Value,
    expected_name: Option<&str>,
) -> Result<ToolSchema, SchemaError> {
    let label = expected_name
        .or_else(|| schema.get("name").and_then(Value::as_str))
        .unwrap_or("<unnamed>")
        .to_string();

    let Some(root) = schema.as_object() else {
        return Err(SchemaError::Malformed {
            tool: label,
            reason: "schema must be a JSON object".into(),
        });
    };

    for field in ["name", "description", "parameters"] {
        if !root.contains_key(field) {
            return Err(SchemaError::MissingField { tool: label, field });
        }
    }

    let name = text_field(root, "name", &label)?;
    if let Some(expected) = expected_name {
        if name != expected {
            return Err(SchemaError::NameMismatch {
                expected: expected.to_string(),
                found: name.to_string(),
            });
        }
    }
    let description = text_field(root, "description", &label)?;

    let params = match root.get("parameters").and_then(Value::as_object) {
        Some(p) if p.get("type").and_then(Value::as_str) == Some("object") => p,
        _ => return Err(SchemaError::ParametersNotObject { tool: label }),
    };

    let Some(properties) = params.get("properties") else {
        return Err(SchemaError::MissingParametersField {
            tool: label,
            field: "properties",
        });
    };
    let Some(required) = params.get("required") else {
        return Err(SchemaError::MissingParametersField {
            tool: label,
            field: "required",
        });
    };

    let properties = properties.as_object().ok_or_else(|| SchemaError::Malformed {
        tool: label.clone(),
        reason: "`properties` must be an object".into(),
    })?;

    let mut typed = BTreeMap::new();
    for (prop_name, prop_def) in properties {
        typed.insert(prop_name.clone(), parse_property(&label, prop_name, prop_def)?);
    }

    let required = parse_required(required, &label)?;
    if let Some(unknown) = required.iter().find(|r| !typed.contains_key(*r)) {
        return Err(SchemaError::UnknownRequired {
            name: unknown.clone(),
        });
    }

    Ok(ToolSchema {
        name: name.to_string(),
        description: description.to_string(),
        parameters: ObjectSchema {
            properties: typed,
            required,
        },
    })
}

fn text_field<'a>(
    root: &'a Map<String, Value>,
    field: &'static str,
    label: &str,
) -> Result<&'a str, SchemaError> {
    root.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| SchemaError::Malformed {
            tool: label.to_string(),
            reason: format!("`{}` must be a string", field),
        })
}

fn parse_property(tool: &str, name: &str, def: &Value) -> Result<PropertySchema, SchemaError> {
    let Some(def) = def.as_object() else {
        return Err(SchemaError::Malformed {
            tool: tool.to_string(),
            reason: format!("definition of `{}` must be an object", name),
        });
    };

    if !def.contains_key("type") {
        return Err(SchemaError::PropertyMissingField {
            property: name.to_string(),
            field: "type",
        });
    }
    if !def.contains_key("description") {
        return Err(SchemaError::PropertyMissingField {
            property: name.to_string(),
            field: "description",
        });
    }
    if def.get("enum").is_some_and(|e| !e.is_array()) {
        return Err(SchemaError::EnumNotList {
            property: name.to_string(),
        });
    }
    if let Some(keyword) = find_unsupported(def) {
        return Err(SchemaError::UnsupportedKeyword {
            property: name.to_string(),
            keyword: keyword.to_string(),
        });
    }

    let kind_text = def.get("type").and_then(Value::as_str).unwrap_or_default();
    let kind = PropertyKind::parse(kind_text).ok_or_else(|| SchemaError::UnsupportedType {
        property: name.to_string(),
        kind: def["type"].to_string(),
    })?;

    let description = def
        .get("description")
        .and_then(Value::as_str)
        .ok_or_else(|| SchemaError::Malformed {
            tool: tool.to_string(),
            reason: format!("`description` of `{}` must be a string", name),
        })?;

    let allowed = match def.get("enum").and_then(Value::as_array) {
        Some(values) => Some(
            values
                .iter()
                .map(|v| {
                    v.as_str().map(str::to_string).ok_or_else(|| SchemaError::Malformed {
                        tool: tool.to_string(),
                        reason: format!("`enum` values of `{}` must be strings", name),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
        ),
        None => None,
    };

    let extra = def
        .iter()
        .filter(|(k, _)| !matches!(k.as_str(), "type" | "description" | "enum"))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    Ok(PropertySchema {
        kind,
        description: description.to_string(),
        allowed,
        extra,
    })
}

/// First unsupported keyword found at any depth of a property definition.
///
/// Keys of a nested `properties` map are parameter names, not keywords; only
/// the definitions under them are searched.
fn find_unsupported(def: &Map<String, Value>) -> Option<&str> {
    for (key, value) in def {
        if UNSUPPORTED_KEYWORDS.contains(&key.as_str()) {
            return Some(key.as_str());
        }
        let nested = match value {
            Value::Object(fields) if key == "properties" => fields
                .values()
                .filter_map(Value::as_object)
                .find_map(find_unsupported),
            Value::Object(map) => find_unsupported(map),
            Value::Array(items) => items
                .iter()
                .filter_map(Value::as_object)
                .find_map(find_unsupported),
            _ => None,
        };
        if nested.is_some() {
            return nested;
        }
    }
    None
}

fn parse_required(required: &Value, label: &str) -> Result<Vec<String>, SchemaError> {
    let malformed = || SchemaError::Malformed {
        tool: label.to_string(),
        reason: "`required` must be a list of parameter names".into(),
    };

    let items = required.as_array().ok_or_else(malformed)?;
    let mut names: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let name = item.as_str().ok_or_else(malformed)?;
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sqrt_schema() -> Value {
        json!({
            "name": "sqrt_num",
            "description": "Positive square root of a number",
            "parameters": {
                "type": "object",
                "properties": {"num": {"type": "integer", "description": "Input number"}},
                "required": ["num"]
            }
        })
    }

    #[test]
    fn accepts_well_formed_schema() {
        let schema = validate_schema(&sqrt_schema(), "sqrt_num").unwrap();
        assert_eq!(schema.name, "sqrt_num");
        assert_eq!(schema.parameters.required, vec!["num".to_string()]);
    }

    #[test]
    fn rejects_missing_top_level_fields() {
        for field in ["name", "description", "parameters"] {
            let mut schema = sqrt_schema();
            schema.as_object_mut().unwrap().remove(field);
            let err = validate_schema(&schema, "sqrt_num").unwrap_err();
            assert_eq!(
                err,
                SchemaError::MissingField {
                    tool: "sqrt_num".into(),
                    field
                }
            );
        }
    }

    #[test]
    fn rejects_name_mismatch() {
        let err = validate_schema(&sqrt_schema(), "square_root").unwrap_err();
        assert!(matches!(err, SchemaError::NameMismatch { found, .. } if found == "sqrt_num"));
    }

    #[test]
    fn rejects_non_object_parameters() {
        let mut schema = sqrt_schema();
        schema["parameters"]["type"] = json!("array");
        assert!(matches!(
            validate_schema(&schema, "sqrt_num"),
            Err(SchemaError::ParametersNotObject { .. })
        ));
    }

    #[test]
    fn rejects_missing_properties_or_required() {
        let mut schema = sqrt_schema();
        schema["parameters"].as_object_mut().unwrap().remove("required");
        assert!(matches!(
            validate_schema(&schema, "sqrt_num"),
            Err(SchemaError::MissingParametersField { field: "required", .. })
        ));

        let mut schema = sqrt_schema();
        schema["parameters"].as_object_mut().unwrap().remove("properties");
        assert!(matches!(
            validate_schema(&schema, "sqrt_num"),
            Err(SchemaError::MissingParametersField { field: "properties", .. })
        ));
    }

    #[test]
    fn rejects_property_without_type_or_description() {
        let mut schema = sqrt_schema();
        schema["parameters"]["properties"]["num"] = json!({"description": "n"});
        assert!(matches!(
            validate_schema(&schema, "sqrt_num"),
            Err(SchemaError::PropertyMissingField { field: "type", .. })
        ));

        schema["parameters"]["properties"]["num"] = json!({"type": "integer"});
        assert!(matches!(
            validate_schema(&schema, "sqrt_num"),
            Err(SchemaError::PropertyMissingField { field: "description", .. })
        ));
    }

    #[test]
    fn rejects_scalar_enum() {
        let mut schema = sqrt_schema();
        schema["parameters"]["properties"]["num"]["enum"] = json!("4");
        assert!(matches!(
            validate_schema(&schema, "sqrt_num"),
            Err(SchemaError::EnumNotList { .. })
        ));
    }

    #[test]
    fn rejects_unsupported_keywords_at_any_depth() {
        let mut schema = sqrt_schema();
        schema["parameters"]["properties"]["num"]["minimum"] = json!(0);
        let err = validate_schema(&schema, "sqrt_num").unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnsupportedKeyword {
                property: "num".into(),
                keyword: "minimum".into()
            }
        );

        let mut schema = sqrt_schema();
        schema["parameters"]["properties"]["tags"] = json!({
            "type": "array",
            "description": "Tags",
            "items": {"type": "string", "default": "x"}
        });
        assert!(matches!(
            validate_schema(&schema, "sqrt_num"),
            Err(SchemaError::UnsupportedKeyword { keyword, .. }) if keyword == "default"
        ));
    }

    #[test]
    fn nested_parameter_names_are_not_keywords() {
        let mut schema = sqrt_schema();
        schema["parameters"]["properties"]["settings"] = json!({
            "type": "object",
            "description": "Rounding settings",
            "properties": {
                "default": {"type": "string", "description": "Fallback mode"},
                "minimum": {"type": "integer", "description": "Lowest precision"}
            }
        });
        let parsed = validate_schema(&schema, "sqrt_num").unwrap();
        assert!(parsed.property("settings").unwrap().extra.contains_key("properties"));

        schema["parameters"]["properties"]["settings"]["properties"]["default"]["default"] =
            json!("half_up");
        assert_eq!(
            validate_schema(&schema, "sqrt_num").unwrap_err(),
            SchemaError::UnsupportedKeyword {
                property: "settings".into(),
                keyword: "default".into()
            }
        );
    }

    #[test]
    fn rejects_kinds_the_typed_model_cannot_hold() {
        let mut schema = sqrt_schema();
        schema["parameters"]["properties"]["num"]["type"] = json!(["integer", "null"]);
        assert!(matches!(
            validate_schema(&schema, "sqrt_num"),
            Err(SchemaError::UnsupportedType { property, .. }) if property == "num"
        ));

        let mut schema = sqrt_schema();
        schema["parameters"]["properties"]["num"]["enum"] = json!([1, 4, 9]);
        assert!(matches!(
            validate_schema(&schema, "sqrt_num"),
            Err(SchemaError::Malformed { tool, reason })
                if tool == "sqrt_num" && reason.contains("`num`")
        ));
    }

    #[test]
    fn property_level_errors_name_the_tool() {
        let mut schema = sqrt_schema();
        schema["parameters"]["properties"]["num"] = json!("integer");
        let err = validate_schema(&schema, "sqrt_num").unwrap_err();
        assert!(matches!(&err, SchemaError::Malformed { tool, .. } if tool == "sqrt_num"));
        assert_eq!(
            err.to_string(),
            "malformed schema for `sqrt_num`: definition of `num` must be an object"
        );

        let mut schema = sqrt_schema();
        schema["parameters"]["properties"]["num"]["description"] = json!(42);
        assert!(matches!(
            validate_schema(&schema, "sqrt_num"),
            Err(SchemaError::Malformed { tool, .. }) if tool == "sqrt_num"
        ));
    }

    #[test]
    fn rejects_required_name_without_property() {
        let mut schema = sqrt_schema();
        schema["parameters"]["required"] = json!(["num", "base"]);
        assert_eq!(
            validate_schema(&schema, "sqrt_num").unwrap_err(),
            SchemaError::UnknownRequired { name: "base".into() }
        );
    }

    #[test]
    fn signature_must_be_single_map_to_text() {
        assert!(validate_signature("t", &Signature::standard()).is_ok());

        let two_args = Signature {
            params: vec![ValueKind::ArgMap, ValueKind::ArgMap],
            returns: ValueKind::Text,
        };
        assert_eq!(
            validate_signature("t", &two_args),
            Err(SignatureError::Arity { tool: "t".into(), arity: 2 })
        );

        let text_arg = Signature {
            params: vec![ValueKind::Text],
            returns: ValueKind::Text,
        };
        assert!(matches!(
            validate_signature("t", &text_arg),
            Err(SignatureError::ArgumentNotMap { .. })
        ));

        let returns_json = Signature {
            params: vec![ValueKind::ArgMap],
            returns: ValueKind::Json,
        };
        assert!(matches!(
            validate_signature("t", &returns_json),
            Err(SignatureError::ReturnNotText { .. })
        ));
    }
}
