//! Conversion between Firestore REST `Value` objects and plain JSON.

use crate::error::StoreError;
use serde_json::{json, Map, Value};

/// Encodes plain JSON as a Firestore `Value`.
pub fn to_firestore(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                json!({ "integerValue": i.to_string() })
            } else if let Some(u) = n.as_u64() {
                json!({ "integerValue": u.to_string() })
            } else {
                json!({ "doubleValue": n.as_f64() })
            }
        }
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(to_firestore).collect::<Vec<_>>() }
        }),
        Value::Object(fields) => json!({ "mapValue": { "fields": encode_fields(fields) } }),
    }
}

pub fn encode_fields(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .map(|(key, value)| (key.clone(), to_firestore(value)))
        .collect()
}

/// Decodes a Firestore `Value` into plain JSON.
///
/// Timestamps, references and bytes come back as their string form.
pub fn from_firestore(value: &Value) -> Result<Value, StoreError> {
    let (kind, inner) = value
        .as_object()
        .and_then(|obj| obj.iter().next())
        .ok_or_else(|| StoreError::Decode(format!("not a Firestore value: {}", value)))?;

    match (kind.as_str(), inner) {
        ("nullValue", _) => Ok(Value::Null),
        ("booleanValue", Value::Bool(b)) => Ok(Value::Bool(*b)),
        ("integerValue", Value::String(s)) => s
            .parse::<i64>()
            .map(Value::from)
            .map_err(|e| StoreError::Decode(format!("integerValue {:?}: {}", s, e))),
        ("integerValue", Value::Number(n)) => Ok(Value::Number(n.clone())),
        ("doubleValue", Value::Number(n)) => Ok(Value::Number(n.clone())),
        ("stringValue" | "timestampValue" | "bytesValue" | "referenceValue", Value::String(s)) => {
            Ok(Value::String(s.clone()))
        }
        ("geoPointValue", point) => Ok(point.clone()),
        ("arrayValue", array) => array
            .get("values")
            .and_then(Value::as_array)
            .map(|values| values.iter().map(from_firestore).collect())
            .unwrap_or_else(|| Ok(Vec::new()))
            .map(Value::Array),
        ("mapValue", map) => match map.get("fields").and_then(Value::as_object) {
            Some(fields) => decode_fields(fields).map(Value::Object),
            None => Ok(Value::Object(Map::new())),
        },
        (kind, raw) => Err(StoreError::Decode(format!(
            "unsupported Firestore value {}: {}",
            kind, raw
        ))),
    }
}

pub fn decode_fields(fields: &Map<String, Value>) -> Result<Map<String, Value>, StoreError> {
    fields
        .iter()
        .map(|(key, value)| Ok((key.clone(), from_firestore(value)?)))
        .collect()
}

/// Flattens a Firestore document into a JSON object with its id under `id`.
pub fn document_to_json(document: &Value) -> Result<Map<String, Value>, StoreError> {
    let name = document
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::Decode("document has no name".into()))?;
    let id = name.rsplit('/').next().unwrap_or(name);

    let mut out = match document.get("fields").and_then(Value::as_object) {
        Some(fields) => decode_fields(fields)?,
        None => Map::new(),
    };
    out.insert("id".into(), Value::String(id.to_string()));
    Ok(out)
}
