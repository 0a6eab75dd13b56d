use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

/// JSON Schema property definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

impl PropertySchema {
    pub fn string(description: impl Into<String>) -> Self {
        Self {
            schema_type: "string".to_string(),
            description: description.into(),
            enum_values: None,
        }
    }

    pub fn one_of(description: impl Into<String>, values: &[&str]) -> Self {
        Self {
            enum_values: Some(values.iter().map(|v| v.to_string()).collect()),
            ..Self::string(description)
        }
    }
}

/// Tool input schema using JSON Schema format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInputSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub properties: HashMap<String, PropertySchema>,
    #[serde(default)]
    pub required: Vec<String>,
}

impl Default for ToolInputSchema {
    fn default() -> Self {
        ToolInputSchema {
            schema_type: "object".to_string(),
            properties: HashMap::new(),
            required: vec![],
        }
    }
}

/// Tool schema advertised to the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: ToolInputSchema,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: ToolInputSchema::default(),
        }
    }

    pub fn with_property(mut self, name: &str, schema: PropertySchema, required: bool) -> Self {
        self.input_schema.properties.insert(name.to_string(), schema);
        if required {
            self.input_schema.required.push(name.to_string());
        }
        self
    }

    /// JSON Schema `parameters` object for function-calling APIs
    pub fn parameters_json(&self) -> Value {
        let properties: serde_json::Map<String, Value> = self
            .input_schema
            .properties
            .iter()
            .map(|(name, prop)| {
                let mut schema = json!({
                    "type": prop.schema_type,
                    "description": prop.description,
                });
                if let Some(ref values) = prop.enum_values {
                    schema["enum"] = json!(values);
                }
                (name.clone(), schema)
            })
            .collect();

        json!({
            "type": self.input_schema.schema_type,
            "properties": properties,
            "required": self.input_schema.required,
        })
    }
}

/// Result of tool execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub content: String,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        ToolResult {
            success: true,
            content: content.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ToolResult {
            success: false,
            content: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameters_json() {
        let def = ToolDefinition::new("git", "Run a git action")
            .with_property("action", PropertySchema::one_of("Git action", &["status", "push"]), true)
            .with_property("remote", PropertySchema::string("Remote name"), false);

        let params = def.parameters_json();
        assert_eq!(params["type"], "object");
        assert_eq!(params["required"], json!(["action"]));
        assert_eq!(params["properties"]["action"]["enum"], json!(["status", "push"]));
        assert!(params["properties"]["remote"].get("enum").is_none());
    }
}
