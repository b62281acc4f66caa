use cop_protocol::NoteRecord;
use indexmap::IndexSet;
use serde::Serialize;
use std::fmt;

use crate::attributes::{AttributeValue, ClassificationLevel};
use crate::secured::SecuredObject;

/// Rendered marking for a set of visible objects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Banner {
    pub level: ClassificationLevel,
    pub caveats: Vec<String>,
}

impl Banner {
    /// `LEVEL//CAVEAT//...`, or the bare level.
    pub fn display(&self) -> String {
        let mut out = self.level.as_str().to_string();
        for c in &self.caveats {
            out.push_str("//");
            out.push_str(c);
        }
        out
    }
}

impl fmt::Display for Banner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// Running aggregate of classification and caveats.
///
/// The empty aggregate is the identity for [`ClassificationBanner::combine`],
/// and the level only ever rises as objects are added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassificationBanner {
    level: ClassificationLevel,
    need_to_know: IndexSet<String>,
    // classification names outside the ordered level set
    unranked: IndexSet<String>,
    rel_to: IndexSet<String>,
}

impl ClassificationBanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(&self) -> ClassificationLevel {
        self.level
    }

    pub fn add(&mut self, object: &SecuredObject) {
        for v in &object.classification {
            let name = v.simple_name();
            if name.is_empty() {
                continue;
            }
            match ClassificationLevel::from_simple_name(&name) {
                Some(level) => self.level = self.level.max(level),
                None => {
                    tracing::warn!(object_id = %object.id, value = %v, "classification outside the known levels");
                    self.unranked.insert(name);
                }
            }
        }
        extend_names(&mut self.need_to_know, &object.need_to_know);
        extend_names(&mut self.rel_to, &object.rel_to);
    }

    pub fn combine(mut self, other: &ClassificationBanner) -> Self {
        self.level = self.level.max(other.level);
        self.need_to_know.extend(other.need_to_know.iter().cloned());
        self.unranked.extend(other.unranked.iter().cloned());
        self.rel_to.extend(other.rel_to.iter().cloned());
        self
    }

    pub fn finish(&self) -> Banner {
        let level_name = self.level.as_str();
        let keep = |s: &&String| s.as_str() != level_name;
        let caveat_names: IndexSet<&String> = self
            .need_to_know
            .iter()
            .chain(self.unranked.iter())
            .filter(keep)
            .collect();
        let mut caveats: Vec<String> = caveat_names.into_iter().cloned().collect();
        let rel: Vec<&str> = self
            .rel_to
            .iter()
            .filter(keep)
            .map(String::as_str)
            .collect();
        if !rel.is_empty() {
            caveats.push(format!("REL TO {}", rel.join(", ")));
        }
        Banner {
            level: self.level,
            caveats,
        }
    }

    pub fn compute<'a>(objects: impl IntoIterator<Item = &'a SecuredObject>) -> Banner {
        let mut agg = Self::new();
        for o in objects {
            agg.add(o);
        }
        agg.finish()
    }

    /// Banner for a single object together with the notes attached to it.
    /// Notes whose attributes cannot be read are left out.
    pub fn for_object(object: &SecuredObject, notes: &[NoteRecord]) -> Banner {
        let mut agg = Self::new();
        agg.add(object);
        for note in notes {
            match SecuredObject::from_note(note) {
                Ok(attrs) => agg.add(&attrs),
                Err(err) => {
                    tracing::debug!(note_id = %note.id, error = %err, "skipping unreadable note in object banner")
                }
            }
        }
        agg.finish()
    }
}

impl<'a> FromIterator<&'a SecuredObject> for ClassificationBanner {
    fn from_iter<T: IntoIterator<Item = &'a SecuredObject>>(iter: T) -> Self {
        let mut agg = Self::new();
        for o in iter {
            agg.add(o);
        }
        agg
    }
}

fn extend_names(set: &mut IndexSet<String>, values: &[AttributeValue]) {
    set.extend(
        values
            .iter()
            .map(AttributeValue::simple_name)
            .filter(|s| !s.is_empty()),
    );
}
