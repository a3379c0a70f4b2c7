// Optional record transforms applied between decode and store

use crate::error::{LoadError, Result};
use crate::record::{Record, json_kind};
use serde_json::Value;
use tracing::debug;

/// Name of the field [`add_length`] writes for `key`.
pub fn length_key(key: &str) -> String {
    format!("{}_length", key)
}

/// Add `<key>_length` to every record: characters of a string, elements of
/// an array or object.
pub fn add_length(records: &mut [Record], key: &str) -> Result<()> {
    let target = length_key(key);
    for (index, record) in records.iter_mut().enumerate() {
        let length = match record.get(key) {
            Some(Value::String(s)) => s.chars().count(),
            Some(Value::Array(items)) => items.len(),
            Some(Value::Object(map)) => map.len(),
            Some(other) => {
                return Err(LoadError::Decode(format!(
                    "record {}: cannot measure '{}', it holds {}",
                    index,
                    key,
                    json_kind(other)
                )));
            }
            None => {
                return Err(LoadError::Decode(format!(
                    "record {} has no field '{}'",
                    index, key
                )));
            }
        };
        record.insert(target.clone(), Value::from(length));
    }
    Ok(())
}

/// Keep the records whose integer `key` is at least `min`.
pub fn filter_min_length(records: Vec<Record>, key: &str, min: i64) -> Vec<Record> {
    let before = records.len();
    let kept: Vec<Record> = records
        .into_iter()
        .filter(|record| {
            record
                .get(key)
                .and_then(Value::as_i64)
                .map(|v| v >= min)
                .unwrap_or(false)
        })
        .collect();
    debug!("Filter {} >= {} kept {} of {} records", key, min, kept.len(), before);
    kept
}
