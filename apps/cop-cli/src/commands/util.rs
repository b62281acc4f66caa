use std::path::Path;

use anyhow::{Context, Result};
use cop_core::SecuredObject;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

pub(crate) fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", out);
    Ok(())
}

/// Load a JSON array of decrypted payloads. Objects without an `id` are
/// numbered by position.
pub(crate) fn read_objects(path: &Path) -> Result<Vec<SecuredObject>> {
    let items: Vec<Map<String, JsonValue>> = read_json(path)?;
    Ok(items
        .iter()
        .enumerate()
        .map(|(i, payload)| {
            let id = payload
                .get("id")
                .and_then(JsonValue::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("#{i}"));
            SecuredObject::from_payload(id, payload)
        })
        .collect())
}
