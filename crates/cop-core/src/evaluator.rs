//! Entitlement checks for decrypted objects and notes.
//!
//! Classification and need-to-know are all-of: every value on the object
//! must be held. Rel-to is any-of: one held value is enough, and an empty
//! rel-to list imposes nothing. Only upper-cased simple names are compared.

use cop_protocol::NoteRecord;
use serde::Serialize;

use crate::attributes::AttributeValue;
use crate::entitlements::ActiveEntitlementSet;
use crate::secured::SecuredObject;

/// Why an object was or was not released to the viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Allowed,
    /// Simple names from classification/need-to-know that the viewer lacks.
    MissingAllOf { missing: Vec<String> },
    /// None of the object's rel-to values are held.
    NoRelToOverlap { rel_to: Vec<String> },
    /// Attributes could not be read; fail closed.
    Unreadable { reason: String },
}

impl Verdict {
    pub fn is_blocked(&self) -> bool {
        !matches!(self, Verdict::Allowed)
    }
}

fn names(values: &[AttributeValue]) -> impl Iterator<Item = String> + '_ {
    values
        .iter()
        .map(AttributeValue::simple_name)
        .filter(|s| !s.is_empty())
}

/// Full decision with the reason attached.
pub fn explain(object: &SecuredObject, active: &ActiveEntitlementSet) -> Verdict {
    let missing: Vec<String> = names(&object.classification)
        .chain(names(&object.need_to_know))
        .filter(|n| !active.holds(n))
        .collect();
    if !missing.is_empty() {
        return Verdict::MissingAllOf { missing };
    }
    if check_rel_to(&object.rel_to, active) {
        return Verdict::NoRelToOverlap {
            rel_to: names(&object.rel_to).collect(),
        };
    }
    Verdict::Allowed
}

/// `true` when the object must be hidden from the viewer.
pub fn check(object: &SecuredObject, active: &ActiveEntitlementSet) -> bool {
    explain(object, active).is_blocked()
}

/// Same rules for a note; unreadable note attributes block the note.
pub fn explain_note(note: &NoteRecord, active: &ActiveEntitlementSet) -> Verdict {
    match SecuredObject::from_note(note) {
        Ok(attrs) => explain(&attrs, active),
        Err(err) => {
            tracing::error!(note_id = %note.id, error = %err, "failed to parse note search attributes");
            Verdict::Unreadable {
                reason: err.to_string(),
            }
        }
    }
}

pub fn check_note(note: &NoteRecord, active: &ActiveEntitlementSet) -> bool {
    explain_note(note, active).is_blocked()
}

/// Any-of check on its own. Empty lists never block.
pub fn check_rel_to(rel_to: &[AttributeValue], active: &ActiveEntitlementSet) -> bool {
    let mut listed = names(rel_to).peekable();
    if listed.peek().is_none() {
        return false;
    }
    !listed.any(|n| active.holds(&n))
}

/// Values in an authoring selection the viewer could not read back.
///
/// All-of categories report each missing value; rel-to reports the whole
/// selection when none of it is held.
pub fn unavailable_attributes(
    selection: &SecuredObject,
    active: &ActiveEntitlementSet,
) -> Vec<AttributeValue> {
    let mut out: Vec<AttributeValue> = selection
        .classification
        .iter()
        .chain(selection.need_to_know.iter())
        .filter(|v| {
            let n = v.simple_name();
            !n.is_empty() && !active.holds(&n)
        })
        .cloned()
        .collect();
    if check_rel_to(&selection.rel_to, active) {
        out.extend(selection.rel_to.iter().cloned());
    }
    out
}
