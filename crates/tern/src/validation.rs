//! Structural checks for function calls before they are handed to tool
//! dispatch. A call that names a declared tool must carry an object
//! payload with the declared required keys and matching value types.

use serde_json::Value;
use tracing::warn;

use crate::models::tool::{Tool, ToolCall};

/// The outcome of checking a call against the declared tools.
#[derive(Debug, Clone, PartialEq)]
pub enum CallValidation {
    Valid,
    /// The called name is not declared. Passed through rather than
    /// corrected; tool dispatch has its own handling for unknown names.
    UnknownFunction,
    Invalid(Vec<String>),
}

pub fn validate_call(call: &ToolCall, tools: &[Tool]) -> CallValidation {
    let Some(tool) = tools.iter().find(|t| t.name == call.name) else {
        warn!(name = %call.name, "model called a function that was not declared");
        return CallValidation::UnknownFunction;
    };

    let mut problems = Vec::new();

    // a null payload counts as calling with no arguments
    let empty = serde_json::Map::new();
    let arguments = if call.arguments.is_null() {
        &empty
    } else {
        match call.arguments.as_object() {
            Some(map) => map,
            None => {
                problems.push(format!(
                    "arguments must be a JSON object, got {}",
                    type_name(&call.arguments)
                ));
                return CallValidation::Invalid(problems);
            }
        }
    };

    let schema = &tool.input_schema;
    if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
        for key in required.iter().filter_map(|k| k.as_str()) {
            if !arguments.contains_key(key) {
                problems.push(format!("missing required parameter '{}'", key));
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) {
        for (key, value) in arguments {
            let declared = properties
                .get(key)
                .and_then(|p| p.get("type"))
                .and_then(|t| t.as_str());
            let Some(declared) = declared else {
                continue;
            };
            if !type_matches(value, declared) {
                problems.push(format!(
                    "parameter '{}' should be of type {}, got {}",
                    key,
                    declared,
                    type_name(value)
                ));
            }
        }
    }

    if problems.is_empty() {
        CallValidation::Valid
    } else {
        CallValidation::Invalid(problems)
    }
}

fn type_matches(value: &Value, declared: &str) -> bool {
    match declared {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        // unrecognized declarations never fail a call
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
