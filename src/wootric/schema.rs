use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported schema for field {field}: {detail}")]
    Unsupported { field: String, detail: String },
}

/// Declared shape of one field: a concrete type, nullability, and whether
/// string values carry a `date-time` format.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub kind: FieldKind,
    pub nullable: bool,
    pub date_time: bool,
}

#[derive(Debug, Clone)]
pub enum FieldKind {
    String,
    Integer,
    Number,
    Boolean,
    Array(Box<FieldSpec>),
}

/// An entity schema: the raw JSON document as declared to the sink, plus a
/// parsed per-field view that drives the record transformer. Loaded once per
/// entity, read-only afterwards.
#[derive(Debug, Clone)]
pub struct EntitySchema {
    raw: Value,
    fields: BTreeMap<String, FieldSpec>,
}

impl EntitySchema {
    pub fn parse(json: &str) -> Result<Self, SchemaError> {
        let raw: Value = serde_json::from_str(json)?;

        let props = raw
            .get("properties")
            .and_then(Value::as_object)
            .ok_or_else(|| SchemaError::Unsupported {
                field: "<root>".to_string(),
                detail: "expected an object schema with properties".to_string(),
            })?;

        let mut fields = BTreeMap::new();
        for (name, field) in props {
            fields.insert(name.clone(), parse_field(name, field)?);
        }

        Ok(Self { raw, fields })
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }
}

fn parse_field(name: &str, value: &Value) -> Result<FieldSpec, SchemaError> {
    // anyOf is only used as a nullable union around one concrete branch.
    if let Some(branches) = value.get("anyOf").and_then(Value::as_array) {
        let mut nullable = false;
        let mut spec: Option<FieldSpec> = None;
        for branch in branches {
            if branch.get("type").and_then(Value::as_str) == Some("null") {
                nullable = true;
            } else {
                if spec.is_some() {
                    return Err(SchemaError::Unsupported {
                        field: name.to_string(),
                        detail: "anyOf with multiple non-null branches".to_string(),
                    });
                }
                spec = Some(parse_field(name, branch)?);
            }
        }
        let mut spec = spec.ok_or_else(|| SchemaError::Unsupported {
            field: name.to_string(),
            detail: "anyOf with no concrete branch".to_string(),
        })?;
        spec.nullable = spec.nullable || nullable;
        return Ok(spec);
    }

    let (type_name, nullable) = match value.get("type") {
        Some(Value::String(t)) => (t.clone(), false),
        Some(Value::Array(types)) => {
            let nullable = types.iter().any(|t| t.as_str() == Some("null"));
            let concrete = types
                .iter()
                .filter_map(Value::as_str)
                .find(|t| *t != "null")
                .ok_or_else(|| SchemaError::Unsupported {
                    field: name.to_string(),
                    detail: "type list with no concrete type".to_string(),
                })?;
            (concrete.to_string(), nullable)
        }
        _ => {
            return Err(SchemaError::Unsupported {
                field: name.to_string(),
                detail: "missing type".to_string(),
            })
        }
    };

    let date_time = match value.get("format").and_then(Value::as_str) {
        None => false,
        Some("date-time") => true,
        Some(other) => {
            return Err(SchemaError::Unsupported {
                field: name.to_string(),
                detail: format!("unknown format {other}"),
            })
        }
    };

    let kind = match type_name.as_str() {
        "string" => FieldKind::String,
        "integer" => FieldKind::Integer,
        "number" => FieldKind::Number,
        "boolean" => FieldKind::Boolean,
        "array" => {
            let items = value.get("items").ok_or_else(|| SchemaError::Unsupported {
                field: name.to_string(),
                detail: "array without items".to_string(),
            })?;
            FieldKind::Array(Box::new(parse_field(name, items)?))
        }
        other => {
            return Err(SchemaError::Unsupported {
                field: name.to_string(),
                detail: format!("unknown type {other}"),
            })
        }
    };

    Ok(FieldSpec {
        kind,
        nullable,
        date_time,
    })
}
