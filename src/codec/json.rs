// Bridge between JSON-safe encodings and serde_json
//
// serde_json is the wire encoder for the JSON-safe target. Only the JSON-safe
// vocabulary crosses this boundary: native blobs and timestamps are rejected.

use serde_json::{Map, Number, Value};

use crate::codec::types::Encoded;
use crate::internal::error::{Error, Result, ResultExt};

/// Converts a JSON-safe encoding into a `serde_json::Value`.
pub fn to_json(encoded: &Encoded) -> Result<Value> {
    match encoded {
        Encoded::Null => Ok(Value::Null),
        Encoded::Bool(b) => Ok(Value::Bool(*b)),
        Encoded::Int(i) => Ok(Value::Number(Number::from(*i))),
        Encoded::Float(f) => Number::from_f64(*f)
            .map(Value::Number)
            .ok_or_else(|| Error::conversion(format!("Float {f} has no JSON representation"))),
        Encoded::Text(s) => Ok(Value::String(s.clone())),
        Encoded::Bytes(_) | Encoded::Timestamp(_) => Err(Error::conversion(format!(
            "{} values are not JSON-safe; encode with the JSON-safe target first",
            encoded.kind()
        ))),
        Encoded::Seq(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                out.push(to_json(item).within(i.to_string())?);
            }
            Ok(Value::Array(out))
        }
        Encoded::Map(entries) => {
            let mut out = Map::with_capacity(entries.len());
            for (key, value) in entries {
                out.insert(key.clone(), to_json(value).within(key.clone())?);
            }
            Ok(Value::Object(out))
        }
    }
}

/// Converts a `serde_json::Value` into a JSON-safe encoding.
pub fn from_json(value: &Value) -> Result<Encoded> {
    match value {
        Value::Null => Ok(Encoded::Null),
        Value::Bool(b) => Ok(Encoded::Bool(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Encoded::Int(i))
            } else if let Some(u) = n.as_u64() {
                Err(Error::conversion(format!("Integer {u} does not fit in a signed 64-bit integer")))
            } else if let Some(f) = n.as_f64() {
                Ok(Encoded::Float(f))
            } else {
                Err(Error::conversion(format!("Unsupported JSON number {n}")))
            }
        }
        Value::String(s) => Ok(Encoded::Text(s.clone())),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                out.push(from_json(item).within(i.to_string())?);
            }
            Ok(Encoded::Seq(out))
        }
        Value::Object(entries) => {
            let mut out = indexmap::IndexMap::with_capacity(entries.len());
            for (key, value) in entries {
                out.insert(key.clone(), from_json(value).within(key.clone())?);
            }
            Ok(Encoded::Map(out))
        }
    }
}

/// Parses JSON text straight into a JSON-safe encoding.
pub fn from_str(text: &str) -> Result<Encoded> {
    let value: Value = serde_json::from_str(text)
        .map_err(|err| Error::conversion(format!("Invalid JSON: {err}")))?;
    from_json(&value)
}

/// Renders a JSON-safe encoding as compact JSON text.
pub fn to_string(encoded: &Encoded) -> Result<String> {
    let value = to_json(encoded)?;
    serde_json::to_string(&value).map_err(|err| Error::conversion(err.to_string()))
}
