//! Dot-path access over raw records.
//!
//! External systems return loosely shaped JSON documents. These helpers keep
//! path-based access at the mapping boundary: a record is read with
//! [`get_path`] and written with [`set_path`], and everything past the mapper
//! works with fully materialized objects.

use serde_json::{Map, Value};

/// Read a value from a record by dot-path.
///
/// A missing path yields `None`, never an error. Path segments only traverse
/// objects; indexing into arrays or scalars yields `None`.
#[must_use]
pub fn get_path<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = record;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Write a value into a record by dot-path, creating intermediate objects as
/// needed.
///
/// If an intermediate segment exists but is not an object it is replaced by
/// one, matching the "last write wins" behavior of the mapping layer.
pub fn set_path(record: &mut Value, path: &str, value: Value) {
    if !record.is_object() {
        *record = Value::Object(Map::new());
    }
    if let Some(map) = record.as_object_mut() {
        set_in(map, path, value);
    }
}

fn set_in(map: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            map.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = map
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Some(child) = entry.as_object_mut() {
                set_in(child, rest, value);
            }
        }
    }
}

/// Render a record value as a lookup key string.
///
/// Strings are used as-is; other scalars use their JSON rendering. Returns
/// `None` for null or missing values.
#[must_use]
pub fn key_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
