//! JSON TEXT encoding of stored preference values.

use serde_json::Value;

use modelprefs_core::{PreferenceError, Preferences};

/// Encodes a value for a `value TEXT` column. Null encodes as `"null"`.
pub fn encode(value: &Value) -> Result<String, PreferenceError> {
    Ok(serde_json::to_string(value)?)
}

/// Decodes a `value TEXT` column. SQL NULL decodes to a present `Null`.
pub fn decode(raw: Option<String>) -> Result<Value, PreferenceError> {
    match raw {
        None => Ok(Value::Null),
        Some(text) => Ok(serde_json::from_str(&text)?),
    }
}

/// Interprets an inline preferences column as a map.
///
/// Objects become their entries and lists become index-keyed entries. A
/// string is decoded as JSON text first. Anything else, including text that
/// does not parse, yields an empty map.
pub fn decode_column(value: Option<&Value>) -> Preferences {
    match value {
        Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v.clone()))
            .collect(),
        Some(Value::String(text)) => match serde_json::from_str::<Value>(text) {
            Ok(decoded @ (Value::Object(_) | Value::Array(_))) => decode_column(Some(&decoded)),
            _ => Preferences::new(),
        },
        _ => Preferences::new(),
    }
}

/// Encodes a preferences map as one JSON object.
pub fn encode_column(preferences: &Preferences) -> Result<String, PreferenceError> {
    Ok(serde_json::to_string(preferences)?)
}
