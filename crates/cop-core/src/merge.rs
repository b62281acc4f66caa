use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ParseError;

/// Result of resolving one object: the decrypted static part, if any, and
/// the plaintext dynamic part parsed on this call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DecryptedPayload {
    /// `None` when decryption failed or produced nothing.
    pub static_fields: Option<Map<String, Value>>,
    pub dynamic_fields: Map<String, Value>,
}

impl DecryptedPayload {
    pub fn has_static(&self) -> bool {
        self.static_fields.is_some()
    }

    /// Flat view with dynamic keys overriding static ones.
    pub fn merged(&self) -> Map<String, Value> {
        match &self.static_fields {
            Some(s) => merge(s, &self.dynamic_fields),
            None => self.dynamic_fields.clone(),
        }
    }
}

/// `{...static, ...dynamic}`: on a key collision the dynamic value wins.
pub fn merge(static_fields: &Map<String, Value>, dynamic: &Map<String, Value>) -> Map<String, Value> {
    let mut out = static_fields.clone();
    for (k, v) in dynamic {
        out.insert(k.clone(), v.clone());
    }
    out
}

/// Parse a JSON object string. Blank input is an empty object.
pub fn parse_object(raw: &str, field: &'static str) -> Result<Map<String, Value>, ParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str(raw).map_err(|source| ParseError::Json { field, source })? {
        Value::Object(map) => Ok(map),
        _ => Err(ParseError::NotAnObject { field }),
    }
}

/// Dynamic plaintext fields for a record. Unparseable input is logged and
/// treated as absent.
pub fn parse_dynamic(object_id: &str, raw: Option<&str>) -> Map<String, Value> {
    let Some(raw) = raw else {
        return Map::new();
    };
    parse_object(raw, "dynamicPlaintextFields").unwrap_or_else(|err| {
        tracing::warn!(object_id, error = %err, "dropping unreadable dynamic fields");
        Map::new()
    })
}
