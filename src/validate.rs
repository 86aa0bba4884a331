//! Structural validation of decoded payloads against a [`ResponseSpec`].
//!
//! Validation coerces where the target type allows it (numeric strings to
//! numbers, `"true"`/`"false"` to booleans, whole-valued floats to
//! integers) and reports every mismatch with a `$`-rooted field path and a
//! reason phrased for verbatim echo into a corrective prompt.

use serde_json::{Map, Number, Value};

use crate::schema::{ResponseSpec, ObjectSpec};

/// Result of running a decoded payload through a spec.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    /// The payload matched; carries the coerced value ready for typed
    /// deserialization.
    Success(Value),
    /// The payload did not match; one entry per mismatched field.
    Failure(Vec<FieldError>),
}

impl ValidationOutcome {
    /// Quick check: did validation succeed?
    pub fn is_success(&self) -> bool {
        matches!(self, ValidationOutcome::Success(_))
    }
}

/// A single validation failure at a specific field path.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    /// Dot/bracket path rooted at `$`, e.g. `$.items[0].name`.
    pub path: String,
    /// Human-readable reason.
    pub message: String,
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Render a failure list as a single line of prose for prompt embedding.
pub fn render_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validate raw decoded data against a spec.
///
/// Returns `Success` with the coerced value, or `Failure` with every
/// mismatch found (validation does not stop at the first error).
pub fn validate(spec: &ResponseSpec, raw: &Value) -> ValidationOutcome {
    let mut errors = Vec::new();
    let coerced = coerce(spec, raw, "$", &mut errors);
    if errors.is_empty() {
        ValidationOutcome::Success(coerced)
    } else {
        ValidationOutcome::Failure(errors)
    }
}

fn coerce(spec: &ResponseSpec, value: &Value, path: &str, errors: &mut Vec<FieldError>) -> Value {
    match spec {
        ResponseSpec::Optional(inner) => {
            if value.is_null() {
                Value::Null
            } else {
                coerce(inner, value, path, errors)
            }
        }
        ResponseSpec::Bool => coerce_bool(value, path, errors),
        ResponseSpec::Integer => coerce_integer(value, path, errors),
        ResponseSpec::Number => coerce_number(value, path, errors),
        ResponseSpec::String => match value {
            Value::String(s) => Value::String(s.clone()),
            other => mismatch(path, "string", other, errors),
        },
        ResponseSpec::List(element) => match value {
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| coerce(element, item, &format!("{}[{}]", path, i), errors))
                    .collect(),
            ),
            other => mismatch(path, "array", other, errors),
        },
        ResponseSpec::Object(obj) => match value {
            Value::Object(map) => coerce_object(obj, map, path, errors),
            other => mismatch(path, "object", other, errors),
        },
    }
}

fn coerce_object(
    obj: &ObjectSpec,
    map: &Map<String, Value>,
    path: &str,
    errors: &mut Vec<FieldError>,
) -> Value {
    let mut out = map.clone();
    for field in &obj.fields {
        let field_path = format!("{}.{}", path, field.name);
        match map.get(&field.name) {
            Some(raw) => {
                let coerced = coerce(&field.spec, raw, &field_path, errors);
                out.insert(field.name.clone(), coerced);
            }
            None if field.spec.is_optional() => {
                // Missing optional fields deserialize to None; leave absent.
            }
            None => {
                errors.push(FieldError {
                    path: field_path,
                    message: "field is required but missing".to_string(),
                });
            }
        }
    }
    Value::Object(out)
}

fn coerce_bool(value: &Value, path: &str, errors: &mut Vec<FieldError>) -> Value {
    match value {
        Value::Bool(b) => Value::Bool(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => mismatch(path, "boolean", value, errors),
        },
        other => mismatch(path, "boolean", other, errors),
    }
}

fn coerce_integer(value: &Value, path: &str, errors: &mut Vec<FieldError>) -> Value {
    match value {
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                Value::Number(n.clone())
            } else if let Some(f) = n.as_f64() {
                // `as i64` saturates, so the cast is only safe in-range.
                if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
                    Value::Number(Number::from(f as i64))
                } else {
                    push(path, format!("expected integer, got number {}", f), errors)
                }
            } else {
                mismatch(path, "integer", value, errors)
            }
        }
        Value::String(s) => match s.trim().parse::<i64>() {
            Ok(i) => Value::Number(Number::from(i)),
            Err(_) => push(
                path,
                format!("expected integer, got string \"{}\"", s),
                errors,
            ),
        },
        other => mismatch(path, "integer", other, errors),
    }
}

fn coerce_number(value: &Value, path: &str, errors: &mut Vec<FieldError>) -> Value {
    match value {
        Value::Number(n) => Value::Number(n.clone()),
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(f) => Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or_else(|| {
                    push(
                        path,
                        format!("expected number, got string \"{}\"", s),
                        errors,
                    )
                }),
            Err(_) => push(
                path,
                format!("expected number, got string \"{}\"", s),
                errors,
            ),
        },
        other => mismatch(path, "number", other, errors),
    }
}

fn mismatch(path: &str, expected: &str, got: &Value, errors: &mut Vec<FieldError>) -> Value {
    push(
        path,
        format!("expected {}, got {}", expected, type_of(got)),
        errors,
    )
}

fn push(path: &str, message: String, errors: &mut Vec<FieldError>) -> Value {
    errors.push(FieldError {
        path: path.to_string(),
        message,
    });
    Value::Null
}

fn type_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
