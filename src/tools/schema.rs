//! Typed tool schema: the restricted JSON-Schema subset exposed to models.
//!
//! Wire format:
//! ```json
//! {"name": "...", "description": "...",
//!  "parameters": {"type": "object",
//!                 "properties": {"<param>": {"type": "...", "description": "...", "enum": [...]}},
//!                 "required": ["<param>"]}}
//! ```

use super::validator;
use crate::types::ToolArgs;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Value type of a single parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl PropertyKind {
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "string" => Some(Self::String),
            "integer" => Some(Self::Integer),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            "array" => Some(Self::Array),
            "object" => Some(Self::Object),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    /// Whether a JSON value has this kind.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One parameter definition.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertySchema {
    pub kind: PropertyKind,
    pub description: String,
    /// Ordered set of allowed string values.
    pub allowed: Option<Vec<String>>,
    /// Other supported keywords (`items`, `format`, ...), kept verbatim.
    pub extra: BTreeMap<String, Value>,
}

impl PropertySchema {
    pub fn new(kind: PropertyKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            allowed: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_enum<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = Some(values.into_iter().map(Into::into).collect());
        self
    }

    fn to_value(&self) -> Value {
        let mut map = Map::new();
        for (key, value) in &self.extra {
            map.insert(key.clone(), value.clone());
        }
        map.insert("type".into(), json!(self.kind.as_str()));
        map.insert("description".into(), json!(self.description));
        if let Some(allowed) = &self.allowed {
            map.insert("enum".into(), json!(allowed));
        }
        Value::Object(map)
    }
}

/// The `parameters` object of a schema. Always `type: "object"`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectSchema {
    pub properties: BTreeMap<String, PropertySchema>,
    pub required: Vec<String>,
}

/// Immutable description of a tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: ObjectSchema,
}

impl ToolSchema {
    /// Parse and validate a wire-format schema without a name check.
    pub fn from_value(value: &Value) -> Result<Self, crate::error::SchemaError> {
        validator::parse_schema(value, None)
    }

    /// Wire-format JSON for this schema.
    pub fn to_value(&self) -> Value {
        let properties: Map<String, Value> = self
            .parameters
            .properties
            .iter()
            .map(|(name, prop)| (name.clone(), prop.to_value()))
            .collect();

        json!({
            "name": self.name,
            "description": self.description,
            "parameters": {
                "type": "object",
                "properties": properties,
                "required": self.parameters.required,
            }
        })
    }

    pub fn property(&self, name: &str) -> Option<&PropertySchema> {
        self.parameters.properties.get(name)
    }

    /// Describe every way `args` departs from the declared parameters.
    /// An empty result means the arguments conform.
    pub fn check_arguments(&self, args: &ToolArgs) -> Vec<String> {
        let mut issues = Vec::new();

        for name in &self.parameters.required {
            if !args.contains_key(name) {
                issues.push(format!("missing required parameter `{}`", name));
            }
        }

        for (name, value) in args {
            let Some(prop) = self.parameters.properties.get(name) else {
                issues.push(format!("unexpected parameter `{}`", name));
                continue;
            };
            if !prop.kind.accepts(value) {
                issues.push(format!("parameter `{}` should be {}", name, prop.kind));
                continue;
            }
            if let (Some(allowed), Some(text)) = (&prop.allowed, value.as_str()) {
                if !allowed.iter().any(|a| a == text) {
                    issues.push(format!(
                        "parameter `{}` must be one of {:?}, got {:?}",
                        name, allowed, text
                    ));
                }
            }
        }

        issues
    }
}

impl Serialize for ToolSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ToolSchema {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trello_like() -> Value {
        json!({
            "name": "list_action",
            "description": "Create, get or update a list",
            "parameters": {
                "type": "object",
                "properties": {
                    "action": {
                        "type": "string",
                        "description": "Action to perform",
                        "enum": ["create", "get", "update"]
                    },
                    "id_list": {"type": "string", "description": "List id"},
                    "limit": {"type": "integer", "description": "Max rows"}
                },
                "required": ["action"]
            }
        })
    }

    #[test]
    fn round_trips_through_json() {
        let schema = ToolSchema::from_value(&trello_like()).unwrap();
        assert_eq!(schema.to_value(), trello_like());

        let text = serde_json::to_string(&schema).unwrap();
        let back: ToolSchema = serde_json::from_str(&text).unwrap();
        assert_eq!(back, schema);
    }

    #[test]
    fn keeps_enum_order() {
        let schema = ToolSchema::from_value(&trello_like()).unwrap();
        let action = schema.property("action").unwrap();
        assert_eq!(action.kind, PropertyKind::String);
        assert_eq!(
            action.allowed.as_deref(),
            Some(&["create".to_string(), "get".to_string(), "update".to_string()][..])
        );
    }

    #[test]
    fn check_arguments_reports_problems() {
        let schema = ToolSchema::from_value(&trello_like()).unwrap();

        let ok: ToolArgs = serde_json::from_value(json!({"action": "get", "limit": 3})).unwrap();
        assert!(schema.check_arguments(&ok).is_empty());

        let bad: ToolArgs =
            serde_json::from_value(json!({"action": "delete", "limit": "ten"})).unwrap();
        let issues = schema.check_arguments(&bad);
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().any(|i| i.contains("`limit` should be integer")));
        assert!(issues.iter().any(|i| i.contains("must be one of")));

        let missing = ToolArgs::new();
        assert_eq!(
            schema.check_arguments(&missing),
            vec!["missing required parameter `action`".to_string()]
        );
    }

    #[test]
    fn invalid_schema_fails_deserialization() {
        let err = serde_json::from_value::<ToolSchema>(json!({"name": "x"})).unwrap_err();
        assert!(err.to_string().contains("description"));
    }
}
