//! Typed accessors over a JSON object tree addressed by a sequence of keys.
//!
//! Every accessor returns `Ok(None)` when the path does not exist (a missing
//! key, or a value along the way that is not an object), `Ok(Some(_))` with
//! the typed value, or a [`FieldError`] when the terminal value exists but has
//! another type.

use serde_json::Value;
use thiserror::Error;

/// The value at the end of a path has the wrong type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path} accessor error: {value} is of the type {actual}, expected {expected}")]
pub struct FieldError {
    pub path: String,
    pub value: String,
    pub actual: &'static str,
    pub expected: &'static str,
}

impl FieldError {
    fn new(path: &[&str], value: &Value, expected: &'static str) -> Self {
        Self {
            path: format!(".{}", path.join(".")),
            value: value.to_string(),
            actual: json_type(value),
            expected,
        }
    }
}

/// JSON type name of a value.
pub fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float64",
        Value::Number(_) => "int64",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Split a dotted field path into its segments.
pub fn split_path(field: &str) -> Vec<&str> {
    field.split('.').collect()
}

/// The value at `path`, if every segment names a key of an object.
pub fn nested_field<'a>(object: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(object, |current, segment| current.as_object()?.get(*segment))
}

pub fn nested_string<'a>(object: &'a Value, path: &[&str]) -> Result<Option<&'a str>, FieldError> {
    nested_field(object, path)
        .map(|value| {
            value
                .as_str()
                .ok_or_else(|| FieldError::new(path, value, "string"))
        })
        .transpose()
}

pub fn nested_bool(object: &Value, path: &[&str]) -> Result<Option<bool>, FieldError> {
    nested_field(object, path)
        .map(|value| {
            value
                .as_bool()
                .ok_or_else(|| FieldError::new(path, value, "bool"))
        })
        .transpose()
}

/// Integer at `path`. Whole-number floats such as `10.0` are accepted,
/// fractional values and values outside the i64 range are not.
pub fn nested_int64(object: &Value, path: &[&str]) -> Result<Option<i64>, FieldError> {
    nested_field(object, path)
        .map(|value| as_whole_i64(value).ok_or_else(|| FieldError::new(path, value, "int64")))
        .transpose()
}

pub fn nested_float64(object: &Value, path: &[&str]) -> Result<Option<f64>, FieldError> {
    nested_field(object, path)
        .map(|value| {
            value
                .as_f64()
                .ok_or_else(|| FieldError::new(path, value, "float64"))
        })
        .transpose()
}

// i64::MAX is not exactly representable as f64; the bound below is 2^63.
const I64_UPPER_BOUND: f64 = 9_223_372_036_854_775_808.0;

fn as_whole_i64(value: &Value) -> Option<i64> {
    let Value::Number(number) = value else {
        return None;
    };
    if let Some(n) = number.as_i64() {
        return Some(n);
    }
    let float = number.as_f64()?;
    if float.fract() == 0.0 && float >= -I64_UPPER_BOUND && float < I64_UPPER_BOUND {
        return Some(float as i64);
    }
    None
}
