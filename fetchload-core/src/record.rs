// Decoding response bodies into records

use crate::error::{LoadError, Result};
use serde_json::{Map, Value};

/// One decoded unit of the response body. Field order follows the body.
pub type Record = Map<String, Value>;

/// Decode a JSON body into records.
///
/// With a `pointer` (RFC 6901, e.g. `/data/items`) the records are taken from
/// that location instead of the document root. An array yields one record per
/// element and every element must be an object; a lone object yields a single
/// record.
pub fn decode_records(body: &[u8], pointer: Option<&str>) -> Result<Vec<Record>> {
    let document: Value = serde_json::from_slice(body)
        .map_err(|e| LoadError::Decode(format!("response body is not valid JSON: {}", e)))?;

    let target = match pointer {
        Some(p) if !p.is_empty() => document.pointer(p).ok_or_else(|| {
            LoadError::Decode(format!("JSON pointer '{}' matched nothing in the response", p))
        })?,
        _ => &document,
    };

    match target {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::Object(map) => Ok(map.clone()),
                other => Err(LoadError::Decode(format!(
                    "element {} is {} rather than an object",
                    index,
                    json_kind(other)
                ))),
            })
            .collect(),
        Value::Object(map) => Ok(vec![map.clone()]),
        other => Err(LoadError::Decode(format!(
            "expected an array of objects or an object, found {}",
            json_kind(other)
        ))),
    }
}

/// Short human name for the JSON type of `value`.
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
