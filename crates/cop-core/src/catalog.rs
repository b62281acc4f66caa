use serde::{Deserialize, Serialize};

use crate::attributes::{AttributeCategory, AttributeValue, ClassificationLevel};

/// Rel-to codes listed ahead of everything else.
const PRIORITY_REL_TO: &[&str] = &["FVEY", "NATO", "PINK", "AUS", "FRA", "GBR", "USA"];

/// Policy definition as already parsed from the platform's policy file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyDefinition {
    pub namespace: String,
    #[serde(default)]
    pub attributes: Vec<AttributeDefinition>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttributeDefinition {
    pub name: String,
    #[serde(default)]
    pub values: Vec<ValueDefinition>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValueDefinition {
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub label: String,
    pub value: AttributeValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

/// Loaded-once universe of attribute values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttributeCatalog {
    pub namespace: String,
    pub classification: Vec<CatalogEntry>,
    pub need_to_know: Vec<CatalogEntry>,
    pub rel_to: Vec<CatalogEntry>,
}

impl AttributeCatalog {
    pub fn from_definition(def: &PolicyDefinition) -> Self {
        let mut catalog = AttributeCatalog {
            namespace: def.namespace.clone(),
            ..Default::default()
        };
        for attr in &def.attributes {
            let Some(category) = AttributeCategory::from_slug(&attr.name) else {
                tracing::debug!(name = %attr.name, "ignoring attribute definition with unknown category");
                continue;
            };
            let entries = attr.values.iter().map(|v| {
                let fqn = AttributeValue::from_parts(&def.namespace, category, &v.value);
                let label = v.value.trim().to_uppercase();
                let group = (category == AttributeCategory::RelTo
                    && PRIORITY_REL_TO.contains(&label.as_str()))
                .then(|| "priority".to_string());
                CatalogEntry {
                    label,
                    value: fqn,
                    group,
                }
            });
            match category {
                AttributeCategory::Classification => catalog.classification.extend(entries),
                AttributeCategory::NeedToKnow => catalog.need_to_know.extend(entries),
                AttributeCategory::RelTo => catalog.rel_to.extend(entries),
            }
        }
        catalog.rel_to.sort_by(|a, b| {
            let a_pri = a.group.is_some();
            let b_pri = b.group.is_some();
            b_pri
                .cmp(&a_pri)
                .then_with(|| a.value.as_str().cmp(b.value.as_str()))
        });
        for entry in &catalog.classification {
            if ClassificationLevel::from_simple_name(&entry.label).is_none() {
                tracing::warn!(
                    value = %entry.value,
                    "classification not in the ordered level set; it will display as a caveat"
                );
            }
        }
        catalog
    }

    /// FQN for `value` in this catalog's namespace.
    pub fn fqn(&self, category: AttributeCategory, value: &str) -> AttributeValue {
        AttributeValue::from_parts(&self.namespace, category, value)
    }

    pub fn entries(&self, category: AttributeCategory) -> &[CatalogEntry] {
        match category {
            AttributeCategory::Classification => &self.classification,
            AttributeCategory::NeedToKnow => &self.need_to_know,
            AttributeCategory::RelTo => &self.rel_to,
        }
    }

    /// Simple names for one category, in catalog order.
    pub fn simple_names(&self, category: AttributeCategory) -> Vec<String> {
        self.entries(category)
            .iter()
            .map(|e| e.value.simple_name())
            .collect()
    }

    /// Catalog classifications that map onto the fixed level set, in policy order.
    pub fn classification_levels(&self) -> Vec<ClassificationLevel> {
        self.classification
            .iter()
            .filter_map(|e| ClassificationLevel::from_simple_name(&e.label))
            .collect()
    }

    /// Whether the value's simple name appears anywhere in the catalog.
    pub fn is_known(&self, value: &AttributeValue) -> bool {
        let name = value.simple_name();
        AttributeCategory::ALL.iter().any(|c| {
            self.entries(*c)
                .iter()
                .any(|e| e.value.simple_name() == name)
        })
    }
}
