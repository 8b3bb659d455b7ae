//! JSON validation utilities for API responses
//!
//! Report pages are parsed into a `serde_json::Value` once, checked for nesting
//! depth, and only then converted into typed structures. Deeply nested payloads
//! are rejected before any typed deserialization happens.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Maximum allowed JSON nesting depth
///
/// Audit log entries are flat records; a report page nests them three or four
/// levels deep. 32 leaves ample headroom.
pub const MAX_JSON_DEPTH: usize = 32;

/// Parse a JSON document and reject it if it nests deeper than `max_depth`
///
/// # Errors
///
/// Returns a message if the text is not valid JSON or exceeds the depth limit.
///
/// # Examples
///
/// ```
/// use veracode_reporting::json_validator::{parse_bounded, MAX_JSON_DEPTH};
///
/// let value = parse_bounded(r#"{"_embedded": {"id": "abc"}}"#, MAX_JSON_DEPTH).unwrap();
/// assert_eq!(value["_embedded"]["id"], "abc");
///
/// let deep = "[".repeat(40) + &"]".repeat(40);
/// assert!(parse_bounded(&deep, MAX_JSON_DEPTH).is_err());
/// ```
pub fn parse_bounded(json_str: &str, max_depth: usize) -> Result<Value, String> {
    let value: Value = serde_json::from_str(json_str).map_err(|e| format!("Invalid JSON: {e}"))?;

    let depth = calculate_depth(&value);
    if depth > max_depth {
        return Err(format!(
            "JSON nesting depth {depth} exceeds maximum allowed depth of {max_depth}"
        ));
    }

    Ok(value)
}

/// Parse with the depth check, then deserialize into `T`
///
/// # Errors
///
/// Returns a message if parsing, the depth check or typed deserialization fails.
pub fn from_str_bounded<T: DeserializeOwned>(json_str: &str) -> Result<T, String> {
    let value = parse_bounded(json_str, MAX_JSON_DEPTH)?;
    serde_json::from_value(value).map_err(|e| format!("Unexpected response shape: {e}"))
}

/// Maximum nesting depth of a JSON value (0 for scalars)
fn calculate_depth(value: &Value) -> usize {
    // Iterative walk so hostile input cannot exhaust the stack here either
    let mut max_depth = 0;
    let mut stack = vec![(value, 0_usize)];

    while let Some((current, depth)) = stack.pop() {
        match current {
            Value::Array(arr) => {
                let depth = depth.saturating_add(1);
                max_depth = max_depth.max(depth);
                stack.extend(arr.iter().map(|v| (v, depth)));
            }
            Value::Object(obj) => {
                let depth = depth.saturating_add(1);
                max_depth = max_depth.max(depth);
                stack.extend(obj.values().map(|v| (v, depth)));
            }
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {}
        }
    }

    max_depth
}
