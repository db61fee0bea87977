use serde::Serialize;
use serde_json::Value;

use crate::error::{CanonError, CanonResult};

/// Identifier of the canonical byte form produced by this module.
pub const CANON_VERSION: &str = "fls-canon-v1";

/// Canonical bytes of any serializable value.
pub fn canonicalize<T: Serialize + ?Sized>(data: &T) -> CanonResult<Vec<u8>> {
    let value =
        serde_json::to_value(data).map_err(|e| CanonError::Serialization(e.to_string()))?;
    canonicalize_value(&value)
}

/// Canonical bytes of a value already in the JSON data model.
pub fn canonicalize_value(value: &Value) -> CanonResult<Vec<u8>> {
    let mut out = Vec::new();
    write_value(&mut out, value)?;
    Ok(out)
}

/// Canonical form as a `String` (for logs and tests).
pub fn to_canonical_string<T: Serialize + ?Sized>(data: &T) -> CanonResult<String> {
    let bytes = canonicalize(data)?;
    String::from_utf8(bytes).map_err(|e| CanonError::Serialization(e.to_string()))
}

fn write_value(out: &mut Vec<u8>, value: &Value) -> CanonResult<()> {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(n) => out.extend_from_slice(n.to_string().as_bytes()),
        Value::String(s) => write_string(out, s)?,
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(out, item)?;
            }
            out.push(b']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.as_bytes().cmp(b.as_bytes()));
            out.push(b'{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_string(out, key)?;
                out.push(b':');
                write_value(out, item)?;
            }
            out.push(b'}');
        }
    }
    Ok(())
}

fn write_string(out: &mut Vec<u8>, s: &str) -> CanonResult<()> {
    serde_json::to_writer(&mut *out, s).map_err(|e| CanonError::Serialization(e.to_string()))
}
