//! Field lookup over a parsed configuration document.
//!
//! Documents are `serde_json::Value` trees. Required fields may name nested
//! keys with `/` or `.` separators (`config/binddn`); a field counts as
//! present only when its value is non-empty (not `null`, `false`, `0`, an
//! empty string, list, or map).

use serde_json::{Map, Value};

use crate::config::ConfigError;

/// Reports whether `path` resolves to a non-empty value inside `document`.
#[must_use]
pub fn is_present(document: &Value, path: &str) -> bool {
    lookup(document, path).is_some_and(is_truthy)
}

/// Resolves `path`, descending one mapping level per separator.
#[must_use]
pub fn lookup<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    match path.split_once(['/', '.']) {
        Some((key, rest)) => {
            let child = document.as_object()?.get(key)?;
            if !is_truthy(child) {
                return None;
            }
            lookup(child, rest)
        }
        None => document.as_object()?.get(path),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n.abs() > 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Fails with [`ConfigError::MissingField`] unless `field` is present.
///
/// # Errors
///
/// Returns [`ConfigError::MissingField`] naming `field` and `scope`.
pub fn require(document: &Value, field: &str, scope: &'static str) -> Result<(), ConfigError> {
    if is_present(document, field) {
        Ok(())
    } else {
        Err(ConfigError::missing(scope, field))
    }
}

/// Reads a required, non-blank string field.
///
/// # Errors
///
/// Returns [`ConfigError::MissingField`] when the field is absent or blank,
/// or [`ConfigError::InvalidField`] when it is not a string.
pub fn require_str(document: &Value, field: &str, scope: &'static str) -> Result<String, ConfigError> {
    require(document, field, scope)?;
    match lookup(document, field) {
        Some(Value::String(text)) if !text.trim().is_empty() => Ok(text.clone()),
        Some(Value::String(_)) => Err(ConfigError::missing(scope, field)),
        _ => Err(ConfigError::invalid(scope, field, "a string")),
    }
}

/// Reads a required list field.
///
/// # Errors
///
/// Returns [`ConfigError::MissingField`] when the key is absent, or
/// [`ConfigError::InvalidField`] when it is not a list.
pub fn require_list<'a>(
    document: &'a Value,
    field: &str,
    scope: &'static str,
) -> Result<&'a [Value], ConfigError> {
    match lookup(document, field) {
        None | Some(Value::Null) => Err(ConfigError::missing(scope, field)),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(ConfigError::invalid(scope, field, "a list")),
    }
}

/// Reads an optional string field, defaulting to an empty string.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the value is not a string.
pub fn optional_str(document: &Value, field: &str, scope: &'static str) -> Result<String, ConfigError> {
    match lookup(document, field) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(text)) => Ok(text.trim().to_owned()),
        Some(_) => Err(ConfigError::invalid(scope, field, "a string")),
    }
}

/// Reads an optional mapping field, defaulting to an empty map.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the value is not a mapping.
pub fn optional_map(
    document: &Value,
    field: &str,
    scope: &'static str,
) -> Result<Map<String, Value>, ConfigError> {
    match lookup(document, field) {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(_) => Err(ConfigError::invalid(scope, field, "a mapping")),
    }
}

/// Reads an optional list of strings, defaulting to an empty list.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the value is not a list of
/// strings.
pub fn optional_str_list(
    document: &Value,
    field: &str,
    scope: &'static str,
) -> Result<Vec<String>, ConfigError> {
    match lookup(document, field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_owned)
                    .ok_or_else(|| ConfigError::invalid(scope, field, "a list of strings"))
            })
            .collect(),
        Some(_) => Err(ConfigError::invalid(scope, field, "a list of strings")),
    }
}
