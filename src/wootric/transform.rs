use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use thiserror::Error;

use super::schema::{EntitySchema, FieldKind, FieldSpec};

/// Timestamp format the Wootric API uses in row bodies,
/// e.g. `2020-01-01 00:00:30 +0000`.
pub const REMOTE_DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S %z";

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("field {field}: cannot parse date-time {value:?}")]
    InvalidDateTime { field: String, value: String },

    #[error("field {field}: null is not allowed")]
    NullNotAllowed { field: String },

    #[error("field {field}: {value} does not match declared type {expected}")]
    TypeMismatch {
        field: String,
        value: Value,
        expected: &'static str,
    },

    #[error("expected a JSON object row, got {0}")]
    NotAnObject(Value),
}

/// Parse a timestamp as delivered by the API, also accepting the canonical
/// RFC 3339 form so the transform is idempotent.
pub fn parse_datetime(field: &str, value: &str) -> Result<DateTime<Utc>, TransformError> {
    DateTime::parse_from_str(value, REMOTE_DATETIME_FMT)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| TransformError::InvalidDateTime {
            field: field.to_string(),
            value: value.to_string(),
        })
}

/// Canonical bookmark/record timestamp representation: RFC 3339 UTC.
pub fn canonical_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Normalize a raw row against its entity schema.
///
/// Declared date-time fields are converted to canonical RFC 3339 UTC, other
/// declared fields are coerced to their declared type, and undeclared fields
/// pass through unchanged. A present date-time value that parses against
/// neither the remote nor the canonical format is fatal: it signals an API
/// contract change, not a recoverable row.
pub fn transform_row(row: &Value, schema: &EntitySchema) -> Result<Value, TransformError> {
    let obj = row
        .as_object()
        .ok_or_else(|| TransformError::NotAnObject(row.clone()))?;

    let mut out = serde_json::Map::with_capacity(obj.len());
    for (name, value) in obj {
        let transformed = match schema.field(name) {
            Some(spec) => transform_field(name, value, spec)?,
            None => value.clone(),
        };
        out.insert(name.clone(), transformed);
    }

    Ok(Value::Object(out))
}

fn transform_field(field: &str, value: &Value, spec: &FieldSpec) -> Result<Value, TransformError> {
    if value.is_null() {
        return if spec.nullable {
            Ok(Value::Null)
        } else {
            Err(TransformError::NullNotAllowed {
                field: field.to_string(),
            })
        };
    }

    match &spec.kind {
        FieldKind::Integer => value
            .as_i64()
            .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
            .map(Value::from)
            .ok_or_else(|| mismatch(field, value, "integer")),
        FieldKind::Number => value
            .as_f64()
            .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
            .map(Value::from)
            .ok_or_else(|| mismatch(field, value, "number")),
        FieldKind::Boolean => value
            .as_bool()
            .map(Value::from)
            .ok_or_else(|| mismatch(field, value, "boolean")),
        FieldKind::String => {
            let s = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return Err(mismatch(field, value, "string")),
            };
            if spec.date_time {
                // The API sends empty strings for unset optional dates.
                if s.is_empty() && spec.nullable {
                    return Ok(Value::Null);
                }
                let dt = parse_datetime(field, &s)?;
                Ok(Value::String(canonical_datetime(dt)))
            } else {
                Ok(Value::String(s))
            }
        }
        FieldKind::Array(items) => {
            let elements = value
                .as_array()
                .ok_or_else(|| mismatch(field, value, "array"))?;
            let transformed: Result<Vec<Value>, TransformError> = elements
                .iter()
                .map(|v| transform_field(field, v, items))
                .collect();
            Ok(Value::Array(transformed?))
        }
    }
}

fn mismatch(field: &str, value: &Value, expected: &'static str) -> TransformError {
    TransformError::TypeMismatch {
        field: field.to_string(),
        value: value.clone(),
        expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wootric::entity::Entity;
    use serde_json::json;

    fn responses_schema() -> EntitySchema {
        EntitySchema::parse(Entity::Responses.schema_json()).unwrap()
    }

    fn end_users_schema() -> EntitySchema {
        EntitySchema::parse(Entity::EndUsers.schema_json()).unwrap()
    }

    #[test]
    fn converts_remote_datetimes_to_rfc3339_utc() {
        let row = json!({
            "id": 1,
            "created_at": "2020-01-01 00:00:30 +0000",
            "updated_at": "2020-01-01 02:00:30 +0200",
            "score": 9,
            "completed": true,
            "tags": ["promoter"]
        });

        let out = transform_row(&row, &responses_schema()).unwrap();
        assert_eq!(out["created_at"], "2020-01-01T00:00:30Z");
        // Offset-bearing timestamps normalize to UTC.
        assert_eq!(out["updated_at"], "2020-01-01T00:00:30Z");
        assert_eq!(out["score"], 9);
        assert_eq!(out["tags"], json!(["promoter"]));
    }

    #[test]
    fn is_idempotent_on_canonical_rows() {
        let row = json!({
            "id": 1,
            "created_at": "2020-01-01 00:00:30 +0000",
            "updated_at": "2020-01-01 00:00:30 +0000",
            "text": "great"
        });
        let schema = responses_schema();

        let once = transform_row(&row, &schema).unwrap();
        let twice = transform_row(&once, &schema).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn null_optional_date_stays_null() {
        let row = json!({
            "id": 1,
            "updated_at": "2020-01-01 00:00:30 +0000",
            "last_surveyed": null
        });
        let out = transform_row(&row, &end_users_schema()).unwrap();
        assert_eq!(out["last_surveyed"], Value::Null);
    }

    #[test]
    fn empty_string_optional_date_becomes_null() {
        let row = json!({"id": 1, "last_surveyed": ""});
        let out = transform_row(&row, &end_users_schema()).unwrap();
        assert_eq!(out["last_surveyed"], Value::Null);
    }

    #[test]
    fn unparseable_date_is_fatal() {
        let row = json!({"id": 1, "updated_at": "01/01/2020 00:00"});
        let err = transform_row(&row, &end_users_schema()).unwrap_err();
        assert!(matches!(err, TransformError::InvalidDateTime { .. }), "got: {err}");
    }

    #[test]
    fn null_in_non_nullable_field_is_fatal() {
        let row = json!({"id": null});
        let err = transform_row(&row, &responses_schema()).unwrap_err();
        assert!(matches!(err, TransformError::NullNotAllowed { .. }));
    }

    #[test]
    fn coerces_string_integers() {
        let row = json!({"id": "42", "page_views_count": 3});
        let out = transform_row(&row, &end_users_schema()).unwrap();
        assert_eq!(out["id"], 42);
        assert_eq!(out["page_views_count"], 3);
    }

    #[test]
    fn type_mismatch_is_fatal() {
        let row = json!({"id": 1, "completed": "yes"});
        let err = transform_row(&row, &responses_schema()).unwrap_err();
        assert!(matches!(err, TransformError::TypeMismatch { .. }));
    }

    #[test]
    fn undeclared_fields_pass_through() {
        let row = json!({"id": 1, "notes_count": {"nested": true}});
        let out = transform_row(&row, &responses_schema()).unwrap();
        assert_eq!(out["notes_count"], json!({"nested": true}));
    }

    #[test]
    fn nullable_non_date_fields_accept_null() {
        let row = json!({"id": 1, "text": null, "external_created_at": null});
        let out = transform_row(&row, &responses_schema()).unwrap();
        assert_eq!(out["text"], Value::Null);

        let out = transform_row(&json!({"id": 1, "external_created_at": null}),
            &end_users_schema())
        .unwrap();
        assert_eq!(out["external_created_at"], Value::Null);
    }

    #[test]
    fn parse_datetime_accepts_both_formats() {
        let a = parse_datetime("updated_at", "2020-01-01 00:00:30 +0000").unwrap();
        let b = parse_datetime("updated_at", "2020-01-01T00:00:30Z").unwrap();
        assert_eq!(a, b);
        assert_eq!(canonical_datetime(a), "2020-01-01T00:00:30Z");
    }

    #[test]
    fn non_object_row_is_fatal() {
        let err = transform_row(&json!([1, 2]), &responses_schema()).unwrap_err();
        assert!(matches!(err, TransformError::NotAnObject(_)));
    }
}
