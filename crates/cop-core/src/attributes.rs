use serde::{Deserialize, Serialize};
use std::fmt;

/// Attribute categories the evaluator understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttributeCategory {
    Classification,
    NeedToKnow,
    RelTo,
}

impl AttributeCategory {
    pub const ALL: [AttributeCategory; 3] = [
        AttributeCategory::Classification,
        AttributeCategory::NeedToKnow,
        AttributeCategory::RelTo,
    ];

    /// Path segment used inside an FQN.
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeCategory::Classification => "classification",
            AttributeCategory::NeedToKnow => "needtoknow",
            AttributeCategory::RelTo => "relto",
        }
    }

    pub fn from_slug(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase().replace(['_', '-'], "");
        match normalized.as_str() {
            "classification" => Some(AttributeCategory::Classification),
            "needtoknow" => Some(AttributeCategory::NeedToKnow),
            "relto" => Some(AttributeCategory::RelTo),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An attribute value, normally an FQN of the form
/// `scheme://{namespace}/attr/{category}/value/{value}`.
///
/// The raw text is kept verbatim. Comparisons that matter for access
/// decisions go through [`AttributeValue::simple_name`], which drops the
/// namespace and category and upper-cases the value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeValue(String);

impl AttributeValue {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Build an FQN; the whole string is lower-cased.
    pub fn from_parts(namespace: &str, category: AttributeCategory, value: &str) -> Self {
        Self(
            format!(
                "https://{}/attr/{}/value/{}",
                namespace.trim(),
                category.as_str(),
                value.trim()
            )
            .to_lowercase(),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// Last path segment, upper-cased. Empty when the raw value is blank.
    pub fn simple_name(&self) -> String {
        simple_name(&self.0)
    }

    /// `true` when both values name the same thing ignoring case and namespace.
    pub fn same_value(&self, other: &AttributeValue) -> bool {
        self.simple_name() == other.simple_name()
    }

    pub fn is_fqn(&self) -> bool {
        self.parts().is_some()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.parts().map(|p| p.0)
    }

    /// Category segment of an FQN. `None` for bare values and unknown categories.
    pub fn category(&self) -> Option<AttributeCategory> {
        self.parts()
            .and_then(|(_, category, _)| AttributeCategory::from_slug(category))
    }

    /// Raw category segment, including categories this crate does not know.
    pub fn category_segment(&self) -> Option<&str> {
        self.parts().map(|p| p.1)
    }

    fn parts(&self) -> Option<(&str, &str, &str)> {
        let (_, rest) = self.0.split_once("://")?;
        let mut segments = rest.split('/');
        let namespace = segments.next().filter(|s| !s.is_empty())?;
        if !segments.next()?.eq_ignore_ascii_case("attr") {
            return None;
        }
        let category = segments.next().filter(|s| !s.is_empty())?;
        if !segments.next()?.eq_ignore_ascii_case("value") {
            return None;
        }
        let value = segments.next().filter(|s| !s.is_empty())?;
        if segments.next().is_some() {
            return None;
        }
        Some((namespace, category, value))
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Upper-cased last path segment of an attribute string.
pub fn simple_name(raw: &str) -> String {
    raw.trim()
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .trim()
        .to_uppercase()
}

/// Fixed, totally ordered classification levels. The discriminant is the priority.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum ClassificationLevel {
    #[default]
    Unclassified = 0,
    Confidential = 1,
    Secret = 2,
    TopSecret = 3,
}

impl ClassificationLevel {
    /// Ascending priority order.
    pub const ALL: [ClassificationLevel; 4] = [
        ClassificationLevel::Unclassified,
        ClassificationLevel::Confidential,
        ClassificationLevel::Secret,
        ClassificationLevel::TopSecret,
    ];

    pub fn priority(&self) -> u8 {
        *self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClassificationLevel::Unclassified => "UNCLASSIFIED",
            ClassificationLevel::Confidential => "CONFIDENTIAL",
            ClassificationLevel::Secret => "SECRET",
            ClassificationLevel::TopSecret => "TOPSECRET",
        }
    }

    /// Look up a level by simple name (case-insensitive). `None` is a policy gap.
    pub fn from_simple_name(name: &str) -> Option<Self> {
        let upper = name.trim().to_uppercase();
        Self::ALL.into_iter().find(|level| level.as_str() == upper)
    }

    pub fn from_priority(priority: u8) -> Option<Self> {
        Self::ALL.get(priority as usize).copied()
    }

    /// Every level at or below `self`, lowest first.
    pub fn subordinates(self) -> Vec<Self> {
        Self::ALL.into_iter().filter(|l| *l <= self).collect()
    }
}

impl fmt::Display for ClassificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
