use cop_protocol::NoteRecord;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::attributes::{AttributeValue, ClassificationLevel};
use crate::error::ParseError;

const CLASSIFICATION_KEYS: &[&str] = &["attrClassification"];
const NEED_TO_KNOW_KEYS: &[&str] = &["attrNeedToKnow", "attrNeedtoknow"];
const REL_TO_KEYS: &[&str] = &["attrRelTo", "attrRelto"];

/// Attribute arrays extracted from a decrypted object or a note.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SecuredObject {
    pub id: String,
    pub classification: Vec<AttributeValue>,
    pub need_to_know: Vec<AttributeValue>,
    pub rel_to: Vec<AttributeValue>,
}

impl SecuredObject {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_classification<V: Into<AttributeValue>>(mut self, values: impl IntoIterator<Item = V>) -> Self {
        self.classification = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_need_to_know<V: Into<AttributeValue>>(mut self, values: impl IntoIterator<Item = V>) -> Self {
        self.need_to_know = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_rel_to<V: Into<AttributeValue>>(mut self, values: impl IntoIterator<Item = V>) -> Self {
        self.rel_to = values.into_iter().map(Into::into).collect();
        self
    }

    /// Pull the three attribute arrays out of a decrypted payload.
    pub fn from_payload(id: impl Into<String>, payload: &Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            classification: attribute_list(first_present(payload, CLASSIFICATION_KEYS)),
            need_to_know: attribute_list(first_present(payload, NEED_TO_KNOW_KEYS)),
            rel_to: attribute_list(first_present(payload, REL_TO_KEYS)),
        }
    }

    /// Parse a note's side-channel `search` JSON. Absent or blank means no attributes.
    pub fn from_note(note: &NoteRecord) -> Result<Self, ParseError> {
        let raw = note.search.as_deref().map(str::trim).unwrap_or_default();
        if raw.is_empty() {
            return Ok(Self::new(note.id.clone()));
        }
        let value: Value = serde_json::from_str(raw).map_err(|source| ParseError::Json {
            field: "note.search",
            source,
        })?;
        let Value::Object(map) = value else {
            return Err(ParseError::NotAnObject {
                field: "note.search",
            });
        };
        Ok(Self::from_payload(note.id.clone(), &map))
    }

    pub fn is_unmarked(&self) -> bool {
        self.classification.is_empty() && self.need_to_know.is_empty() && self.rel_to.is_empty()
    }

    /// Highest recognised classification; unmarked objects count as UNCLASSIFIED.
    pub fn level(&self) -> ClassificationLevel {
        self.classification
            .iter()
            .filter_map(|v| ClassificationLevel::from_simple_name(&v.simple_name()))
            .max()
            .unwrap_or_default()
    }
}

fn first_present<'a>(payload: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| payload.get(*k))
}

/// Accepts a string, an array of strings, or an array of `{ "value": ... }` objects.
fn attribute_list(value: Option<&Value>) -> Vec<AttributeValue> {
    let raw: Vec<&str> = match value {
        Some(Value::String(s)) => vec![s.as_str()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.as_str()),
                Value::Object(obj) => obj.get("value").and_then(Value::as_str),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };
    raw.into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(AttributeValue::new)
        .filter(|v| {
            // Values under a category we do not model are passed over, not enforced.
            let unknown = v.category_segment().is_some() && v.category().is_none();
            if unknown {
                tracing::debug!(value = %v, "ignoring attribute with unknown category");
            }
            !unknown
        })
        .collect()
}
