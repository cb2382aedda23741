//! JSON-schema argument validation for `tools/call`
//!
//! A deliberately small checker covering the subset tools declare: a
//! top-level `object`, `required` lists, per-property types
//! (string / number / integer / boolean / array / object), `enum`
//! membership, and recursion into object properties. Unknown argument keys
//! are rejected.

use serde_json::{Map, Value};

/// A validation failure, pointing at the offending field
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid argument {field}: {message}")]
pub struct SchemaViolation {
    /// The argument (or nested path) that failed.
    pub field: String,
    /// What went wrong.
    pub message: String,
}

impl SchemaViolation {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate `arguments` against a tool input schema
///
/// Validation is idempotent: arguments are never rewritten, so validating
/// an already-validated map yields the same result.
pub fn validate_arguments(
    schema: &Value,
    arguments: &Map<String, Value>,
) -> Result<(), SchemaViolation> {
    validate_object(schema, arguments, "")
}

fn path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn validate_object(
    schema: &Value,
    arguments: &Map<String, Value>,
    prefix: &str,
) -> Result<(), SchemaViolation> {
    match schema.get("type").and_then(Value::as_str) {
        Some("object") => {}
        other => {
            return Err(SchemaViolation::new(
                if prefix.is_empty() { "$" } else { prefix },
                format!("schema type must be \"object\", got {other:?}"),
            ));
        }
    }

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for field in required.iter().filter_map(Value::as_str) {
            if !arguments.contains_key(field) {
                return Err(SchemaViolation::new(
                    path(prefix, field),
                    "missing required field",
                ));
            }
        }
    }

    let empty = Map::new();
    let properties = schema
        .get("properties")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    for (key, value) in arguments {
        let Some(prop) = properties.get(key) else {
            return Err(SchemaViolation::new(path(prefix, key), "unknown field"));
        };
        validate_value(prop, value, &path(prefix, key))?;
    }

    Ok(())
}

fn validate_value(prop: &Value, value: &Value, field: &str) -> Result<(), SchemaViolation> {
    if let Some(prop_type) = prop.get("type").and_then(Value::as_str) {
        match prop_type {
            "string" => {
                if !value.is_string() {
                    return Err(SchemaViolation::new(field, "must be a string"));
                }
            }
            "number" => {
                if !value.is_number() {
                    return Err(SchemaViolation::new(field, "must be a number"));
                }
            }
            "integer" => {
                let integral = value.as_i64().is_some()
                    || value.as_u64().is_some()
                    || value.as_f64().is_some_and(|f| f.fract() == 0.0);
                if !value.is_number() || !integral {
                    return Err(SchemaViolation::new(field, "must be an integer"));
                }
            }
            "boolean" => {
                if !value.is_boolean() {
                    return Err(SchemaViolation::new(field, "must be a boolean"));
                }
            }
            "array" => {
                if !value.is_array() {
                    return Err(SchemaViolation::new(field, "must be an array"));
                }
            }
            "object" => {
                let Some(obj) = value.as_object() else {
                    return Err(SchemaViolation::new(field, "must be an object"));
                };
                // Objects recurse with their own required list.
                if prop.get("properties").is_some() {
                    validate_object(prop, obj, field)?;
                }
            }
            _ => {}
        }
    }

    if let Some(allowed) = prop.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            return Err(SchemaViolation::new(
                field,
                format!(
                    "must be one of {}",
                    serde_json::to_string(allowed).unwrap_or_default()
                ),
            ));
        }
    }

    Ok(())
}
