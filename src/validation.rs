// ABOUTME: JSON-schema subset validator for tool parameter checking
// ABOUTME: Validates inbound arguments, materialises defaults, and reports field-path violations
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Codomyrmex Contributors

//! # Parameter Schema Validation
//!
//! A small validator for the schema subset tool descriptors actually use:
//! object types with `properties`, `required`, `default`, primitive `type`
//! strings, arrays with `items`, and nested objects. A full Draft-2020 engine
//! is deliberately not embedded.
//!
//! Unknown fields are rejected unless the schema declares
//! `additionalProperties: true`. Defaults are materialised into the argument
//! map before the handler sees them.

use serde_json::{Map, Value};
use std::fmt;

/// A single schema violation, anchored to the offending field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// Dotted path of the offending field (empty for the top-level value)
    pub field: String,
    /// Description of the violation
    pub message: String,
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}

impl SchemaViolation {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate `arguments` against a tool parameter schema and materialise
/// defaults.
///
/// `arguments` may be `null` or absent-as-`Null`, which is treated as an
/// empty object. Returns the (possibly augmented) argument object.
///
/// # Errors
/// Returns the first [`SchemaViolation`] encountered.
pub fn validate_arguments(schema: &Value, arguments: Value) -> Result<Value, SchemaViolation> {
    let mut args = match arguments {
        Value::Null => Map::new(),
        Value::Object(map) => map,
        other => {
            return Err(SchemaViolation::new(
                "",
                format!("arguments must be an object, got {}", type_name(&other)),
            ))
        }
    };

    validate_object(schema, &mut args, "")?;
    Ok(Value::Object(args))
}

/// Validate an object value in place against an object schema.
fn validate_object(
    schema: &Value,
    value: &mut Map<String, Value>,
    path: &str,
) -> Result<(), SchemaViolation> {
    let properties = schema
        .get("properties")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let additional = schema
        .get("additionalProperties")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    // Unknown fields first so the error names the stray key, not a type issue.
    if !additional {
        for key in value.keys() {
            if !properties.contains_key(key) {
                return Err(SchemaViolation::new(
                    join_path(path, key),
                    "unknown field not declared in schema",
                ));
            }
        }
    }

    // Materialise defaults before required-field checks: a property with a
    // default can never be missing.
    for (key, prop_schema) in &properties {
        if !value.contains_key(key) {
            if let Some(default) = prop_schema.get("default") {
                value.insert(key.clone(), default.clone());
            }
        }
    }

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for name in required.iter().filter_map(Value::as_str) {
            if !value.contains_key(name) {
                return Err(SchemaViolation::new(
                    join_path(path, name),
                    "missing required field",
                ));
            }
        }
    }

    for (key, prop_schema) in &properties {
        if let Some(field_value) = value.get_mut(key) {
            validate_value(prop_schema, field_value, &join_path(path, key))?;
        }
    }

    Ok(())
}

/// Validate a single value against its property schema.
fn validate_value(schema: &Value, value: &mut Value, path: &str) -> Result<(), SchemaViolation> {
    let Some(expected) = schema.get("type").and_then(Value::as_str) else {
        // No type constraint: anything goes.
        return Ok(());
    };

    let ok = match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        other => {
            return Err(SchemaViolation::new(
                path,
                format!("schema declares unsupported type {other:?}"),
            ))
        }
    };

    if !ok {
        return Err(SchemaViolation::new(
            path,
            format!("expected {expected}, got {}", type_name(value)),
        ));
    }

    match expected {
        "object" => {
            if let Value::Object(map) = value {
                validate_object(schema, map, path)?;
            }
        }
        "array" => {
            if let (Some(item_schema), Value::Array(items)) = (schema.get("items"), &mut *value) {
                for (index, item) in items.iter_mut().enumerate() {
                    validate_value(item_schema, item, &format!("{path}[{index}]"))?;
                }
            }
        }
        _ => {}
    }

    Ok(())
}

/// Human name for a JSON value's type, used in violation messages.
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

fn join_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_owned()
    } else {
        format!("{path}.{key}")
    }
}
