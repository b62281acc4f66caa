use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::attributes::{AttributeCategory, AttributeValue, ClassificationLevel};
use crate::error::EntitlementError;

/// Every attribute FQN a principal holds after authentication. Immutable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntitlementSet {
    values: IndexSet<AttributeValue>,
}

impl EntitlementSet {
    pub fn new<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<AttributeValue>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, value: &AttributeValue) -> bool {
        self.values.contains(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttributeValue> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Group values by FQN category segment, de-duplicated, first-seen order.
    pub fn categorized(&self) -> IndexMap<String, Vec<String>> {
        let mut out: IndexMap<String, Vec<String>> = IndexMap::new();
        for v in &self.values {
            let (Some(category), Some(_)) = (v.category_segment(), v.namespace()) else {
                tracing::warn!(value = %v, "skipping entitlement that is not an attribute FQN");
                continue;
            };
            let value = v.as_str().rsplit('/').next().unwrap_or_default().to_string();
            let bucket = out.entry(category.to_string()).or_default();
            if !bucket.contains(&value) {
                bucket.push(value);
            }
        }
        out
    }

    /// Highest classification level the principal is cleared for.
    pub fn highest_classification(&self) -> Option<ClassificationLevel> {
        self.values
            .iter()
            .filter(|v| v.category() == Some(AttributeCategory::Classification))
            .filter_map(|v| ClassificationLevel::from_simple_name(&v.simple_name()))
            .max()
    }
}

/// The working subset of entitlements enforced at query time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveEntitlementSet {
    values: IndexSet<AttributeValue>,
    #[serde(skip)]
    simple: HashSet<String>,
    no_access: bool,
}

impl ActiveEntitlementSet {
    /// Sentinel used before entitlements are known.
    pub fn no_access() -> Self {
        Self {
            values: IndexSet::new(),
            simple: HashSet::new(),
            no_access: true,
        }
    }

    pub fn full(granted: &EntitlementSet) -> Self {
        Self::from_values(granted.iter().cloned())
    }

    fn from_values(values: impl IntoIterator<Item = AttributeValue>) -> Self {
        let values: IndexSet<AttributeValue> = values.into_iter().collect();
        let simple = values
            .iter()
            .map(AttributeValue::simple_name)
            .filter(|s| !s.is_empty())
            .collect();
        Self {
            values,
            simple,
            no_access: false,
        }
    }

    pub fn is_no_access(&self) -> bool {
        self.no_access
    }

    /// Upper-cased simple names; the only view the evaluator uses.
    pub fn simple_names(&self) -> &HashSet<String> {
        &self.simple
    }

    pub fn holds(&self, simple_name: &str) -> bool {
        self.simple.contains(simple_name)
    }

    pub fn values(&self) -> impl Iterator<Item = &AttributeValue> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Default for ActiveEntitlementSet {
    fn default() -> Self {
        Self::no_access()
    }
}

/// A user's narrowing choice: a ceiling classification plus the caveats to keep.
#[derive(Debug, Clone, Default)]
pub struct NarrowingSelection {
    pub classification: ClassificationLevel,
    pub need_to_know: Vec<String>,
    pub rel_to: Vec<String>,
}

struct StoreState {
    granted: Option<Arc<EntitlementSet>>,
    active: Arc<ActiveEntitlementSet>,
    epoch: u64,
}

/// Owner of the granted and active sets for the current session.
///
/// Readers take an [`Arc`] snapshot, so a narrowing that lands mid-pass
/// never changes what that pass evaluates against.
pub struct EntitlementStore {
    state: RwLock<StoreState>,
}

impl Default for EntitlementStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntitlementStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState {
                granted: None,
                active: Arc::new(ActiveEntitlementSet::no_access()),
                epoch: 0,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(|p| p.into_inner())
    }

    /// Install the entitlements issued at sign-in and reset the active set to all of them.
    pub fn sign_in(
        &self,
        entitlements: Option<Vec<String>>,
    ) -> Result<Arc<ActiveEntitlementSet>, EntitlementError> {
        let mut st = self.write();
        st.epoch = st.epoch.saturating_add(1);
        let Some(list) = entitlements else {
            st.granted = None;
            st.active = Arc::new(ActiveEntitlementSet::no_access());
            tracing::error!("sign-in returned no entitlements; re-authentication required");
            return Err(EntitlementError::Missing);
        };
        let granted = EntitlementSet::new(list);
        let active = Arc::new(ActiveEntitlementSet::full(&granted));
        tracing::info!(count = granted.len(), "entitlements installed");
        st.granted = Some(Arc::new(granted));
        st.active = active.clone();
        Ok(active)
    }

    pub fn sign_out(&self) {
        let mut st = self.write();
        st.granted = None;
        st.active = Arc::new(ActiveEntitlementSet::no_access());
        st.epoch = st.epoch.saturating_add(1);
    }

    pub fn granted(&self) -> Option<Arc<EntitlementSet>> {
        self.read().granted.clone()
    }

    pub fn snapshot(&self) -> Arc<ActiveEntitlementSet> {
        self.read().active.clone()
    }

    /// Bumped on every sign-in, sign-out and narrowing.
    pub fn epoch(&self) -> u64 {
        self.read().epoch
    }

    /// Epoch and active set read under one lock, so the pair always agrees.
    pub fn versioned_snapshot(&self) -> (u64, Arc<ActiveEntitlementSet>) {
        let st = self.read();
        (st.epoch, st.active.clone())
    }

    /// Restore the active set to everything granted.
    pub fn reset(&self) -> Result<Arc<ActiveEntitlementSet>, EntitlementError> {
        let mut st = self.write();
        let granted = st.granted.clone().ok_or(EntitlementError::NotSignedIn)?;
        st.active = Arc::new(ActiveEntitlementSet::full(&granted));
        st.epoch = st.epoch.saturating_add(1);
        Ok(st.active.clone())
    }

    /// Narrow to a classification ceiling and caveat selection.
    ///
    /// Granted values of other categories are kept as they are.
    pub fn narrow(
        &self,
        selection: &NarrowingSelection,
    ) -> Result<Arc<ActiveEntitlementSet>, EntitlementError> {
        let mut st = self.write();
        let granted = st.granted.clone().ok_or(EntitlementError::NotSignedIn)?;
        let allowed_levels = selection.classification.subordinates();
        let ntk: HashSet<String> = selection
            .need_to_know
            .iter()
            .map(|s| s.trim().to_uppercase())
            .collect();
        let rel: HashSet<String> = selection
            .rel_to
            .iter()
            .map(|s| s.trim().to_uppercase())
            .collect();

        let kept = granted.iter().filter(|v| {
            let name = v.simple_name();
            if name.is_empty() {
                return false;
            }
            match v.category() {
                Some(AttributeCategory::Classification) => {
                    ClassificationLevel::from_simple_name(&name)
                        .map(|l| allowed_levels.contains(&l))
                        .unwrap_or(false)
                }
                Some(AttributeCategory::NeedToKnow) => ntk.contains(&name),
                Some(AttributeCategory::RelTo) => rel.contains(&name),
                None => true,
            }
        });
        let active = Arc::new(ActiveEntitlementSet::from_values(kept.cloned()));
        tracing::info!(
            ceiling = %selection.classification,
            kept = active.len(),
            granted = granted.len(),
            "active entitlements narrowed"
        );
        st.active = active.clone();
        st.epoch = st.epoch.saturating_add(1);
        Ok(active)
    }

    /// Narrow to an explicit list of FQNs, all of which must already be granted.
    pub fn narrow_to<I, V>(&self, values: I) -> Result<Arc<ActiveEntitlementSet>, EntitlementError>
    where
        I: IntoIterator<Item = V>,
        V: Into<AttributeValue>,
    {
        let mut st = self.write();
        let granted = st.granted.clone().ok_or(EntitlementError::NotSignedIn)?;
        let wanted: Vec<AttributeValue> = values.into_iter().map(Into::into).collect();
        let missing: Vec<String> = wanted
            .iter()
            .filter(|v| !granted.contains(v))
            .map(|v| v.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(EntitlementError::NotGranted(missing));
        }
        let active = Arc::new(ActiveEntitlementSet::from_values(wanted));
        st.active = active.clone();
        st.epoch = st.epoch.saturating_add(1);
        Ok(active)
    }
}
