use std::sync::Arc;

use cop_events::{kinds, Bus};
use cop_protocol::RawRecord;
use futures_util::future::join_all;
use serde::Serialize;
use serde_json::json;

use crate::attributes::AttributeValue;
use crate::banner::{Banner, ClassificationBanner};
use crate::entitlements::{ActiveEntitlementSet, EntitlementStore, NarrowingSelection};
use crate::error::EntitlementError;
use crate::evaluator::{explain, Verdict};
use crate::pool::DecryptBackend;
use crate::resolver::{ObjectResolver, ResolvedObject};

#[derive(Debug, Clone, Serialize)]
pub struct BlockedObject {
    pub id: String,
    pub verdict: Verdict,
    /// Kept only for unreadable objects so their dynamic telemetry can still be
    /// shown with identity fields marked unavailable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<ResolvedObject>,
}

/// Outcome of one refresh pass.
#[derive(Debug, Clone, Serialize)]
pub struct ViewSnapshot {
    /// Entitlement epoch the pass was evaluated under.
    pub epoch: u64,
    pub visible: Vec<ResolvedObject>,
    pub blocked: Vec<BlockedObject>,
    pub banner: Banner,
}

impl ViewSnapshot {
    pub fn blocked_count(&self) -> usize {
        self.blocked.len()
    }

    /// Blocked objects whose ciphertext could not be read, with their telemetry.
    pub fn unreadable(&self) -> impl Iterator<Item = &ResolvedObject> {
        self.blocked.iter().filter_map(|b| b.object.as_ref())
    }
}

/// Ties the session's entitlements, the resolver and the event bus together.
pub struct SituationalView<B: DecryptBackend> {
    store: Arc<EntitlementStore>,
    resolver: ObjectResolver<B>,
    bus: Bus,
}

impl<B: DecryptBackend> SituationalView<B> {
    pub fn new(store: Arc<EntitlementStore>, resolver: ObjectResolver<B>, bus: Bus) -> Self {
        Self {
            store,
            resolver,
            bus,
        }
    }

    pub fn store(&self) -> &Arc<EntitlementStore> {
        &self.store
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn sign_in(
        &self,
        entitlements: Option<Vec<String>>,
    ) -> Result<Arc<ActiveEntitlementSet>, EntitlementError> {
        let res = self.store.sign_in(entitlements);
        self.context_changed("sign_in");
        res
    }

    pub fn sign_out(&self) {
        self.store.sign_out();
        self.context_changed("sign_out");
    }

    /// Narrow the active set and drop cached payloads decrypted under the old context.
    pub fn narrow(
        &self,
        selection: &NarrowingSelection,
    ) -> Result<Arc<ActiveEntitlementSet>, EntitlementError> {
        let active = self.store.narrow(selection)?;
        self.context_changed("narrow");
        Ok(active)
    }

    pub fn narrow_to<I, V>(&self, values: I) -> Result<Arc<ActiveEntitlementSet>, EntitlementError>
    where
        I: IntoIterator<Item = V>,
        V: Into<AttributeValue>,
    {
        let active = self.store.narrow_to(values)?;
        self.context_changed("narrow");
        Ok(active)
    }

    pub fn reset(&self) -> Result<Arc<ActiveEntitlementSet>, EntitlementError> {
        let active = self.store.reset()?;
        self.context_changed("reset");
        Ok(active)
    }

    /// Resolve a batch of records and filter them against one entitlement snapshot.
    ///
    /// Records whose ciphertext could not be read are blocked and stay out of
    /// the banner. Their resolved dynamic fields ride along on the blocked row.
    pub async fn refresh(&self, records: Vec<RawRecord>) -> ViewSnapshot {
        let resolved = join_all(
            records
                .into_iter()
                .map(|record| self.resolver.resolve_record(record)),
        )
        .await;

        let (epoch, active) = self.store.versioned_snapshot();
        let mut visible = Vec::with_capacity(resolved.len());
        let mut blocked = Vec::new();
        for object in resolved {
            let verdict = if object.payload.has_static() {
                explain(&object.attributes, &active)
            } else {
                Verdict::Unreadable {
                    reason: "static payload unavailable".into(),
                }
            };
            if verdict.is_blocked() {
                tracing::debug!(object_id = %object.id, ?verdict, "object withheld");
                let id = object.id.clone();
                let object = matches!(verdict, Verdict::Unreadable { .. }).then_some(object);
                blocked.push(BlockedObject {
                    id,
                    verdict,
                    object,
                });
            } else {
                visible.push(object);
            }
        }

        let banner = ClassificationBanner::compute(visible.iter().map(|o| &o.attributes));
        self.bus.publish(
            kinds::BANNER_UPDATED,
            &json!({
                "epoch": epoch,
                "banner": banner.display(),
                "visible": visible.len(),
                "blocked": blocked.len(),
            }),
        );
        ViewSnapshot {
            epoch,
            visible,
            blocked,
            banner,
        }
    }

    fn context_changed(&self, reason: &str) {
        let cache = self.resolver.cache();
        let dropped = cache.len();
        cache.clear();
        self.bus.publish(
            kinds::CACHE_CLEARED,
            &json!({ "reason": reason, "dropped": dropped }),
        );
        let (epoch, active) = self.store.versioned_snapshot();
        self.bus.publish(
            kinds::ENTITLEMENTS_CHANGED,
            &json!({
                "reason": reason,
                "epoch": epoch,
                "active": active.len(),
                "no_access": active.is_no_access(),
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::ClassificationLevel;
    use crate::cache::ObjectCache;
    use crate::error::PoolError;
    use async_trait::async_trait;
    use cop_protocol::DecryptionResult;

    struct Plain;

    #[async_trait]
    impl DecryptBackend for Plain {
        async fn decrypt(&self, ciphertext: Vec<u8>) -> Result<DecryptionResult, PoolError> {
            if ciphertext.is_empty() {
                return Ok(DecryptionResult::default());
            }
            Ok(DecryptionResult::ok(String::from_utf8_lossy(&ciphertext)))
        }
    }

    fn fqn(category: &str, value: &str) -> String {
        format!("https://demo.com/attr/{category}/value/{value}")
    }

    fn record(id: &str, level: &str, rel_to: &[&str]) -> RawRecord {
        let rel: Vec<String> = rel_to.iter().map(|r| fqn("relto", r)).collect();
        RawRecord {
            id: id.into(),
            source_type_id: "track".into(),
            ciphertext_blob: serde_json::to_vec(&json!({
                "name": id,
                "attrClassification": [fqn("classification", level)],
                "attrRelTo": rel,
            }))
            .unwrap(),
            ..Default::default()
        }
    }

    fn view() -> SituationalView<Plain> {
        let cache = Arc::new(ObjectCache::new(["track"]));
        SituationalView::new(
            Arc::new(EntitlementStore::new()),
            ObjectResolver::new(Arc::new(Plain), cache),
            Bus::new(16),
        )
    }

    fn granted() -> Vec<String> {
        vec![
            fqn("classification", "unclassified"),
            fqn("classification", "confidential"),
            fqn("classification", "secret"),
            fqn("relto", "usa"),
        ]
    }

    #[tokio::test]
    async fn refresh_filters_and_builds_banner() {
        let v = view();
        v.sign_in(Some(granted())).unwrap();
        let snap = v
            .refresh(vec![
                record("a", "secret", &["usa", "gbr"]),
                record("b", "secret", &["gbr"]),
                record("c", "topsecret", &[]),
                RawRecord {
                    id: "d".into(),
                    source_type_id: "track".into(),
                    ..Default::default()
                },
            ])
            .await;
        let ids: Vec<&str> = snap.visible.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);
        assert_eq!(snap.blocked_count(), 3);
        assert_eq!(snap.banner.display(), "SECRET//REL TO USA, GBR");
        let unreadable: Vec<&str> = snap.unreadable().map(|o| o.id.as_str()).collect();
        assert_eq!(unreadable, vec!["d"]);
    }

    #[tokio::test]
    async fn unreadable_objects_keep_telemetry_out_of_banner() {
        let v = view();
        v.sign_in(Some(granted())).unwrap();
        let snap = v
            .refresh(vec![
                record("a", "confidential", &[]),
                RawRecord {
                    id: "x".into(),
                    source_type_id: "track".into(),
                    ciphertext_blob: b"not json".to_vec(),
                    dynamic_plaintext_fields: Some(r#"{"speed":7}"#.into()),
                    ..Default::default()
                },
            ])
            .await;
        assert_eq!(snap.visible.len(), 1);
        let failed = snap.unreadable().next().unwrap();
        assert_eq!(failed.id, "x");
        assert_eq!(failed.fields()["speed"], 7);
        assert!(failed.payload.static_fields.is_none());
        assert_eq!(snap.banner.display(), "CONFIDENTIAL");

        let rendered = serde_json::to_value(&snap).unwrap();
        assert_eq!(rendered["blocked"][0]["object"]["payload"]["dynamic_fields"]["speed"], 7);
    }

    #[tokio::test]
    async fn policy_blocks_carry_no_payload() {
        let v = view();
        v.sign_in(Some(granted())).unwrap();
        let snap = v.refresh(vec![record("c", "topsecret", &[])]).await;
        assert_eq!(snap.blocked_count(), 1);
        assert!(snap.blocked[0].object.is_none());
        assert_eq!(snap.unreadable().count(), 0);
        let rendered = serde_json::to_value(&snap).unwrap();
        assert!(rendered["blocked"][0].get("object").is_none());
    }

    #[tokio::test]
    async fn narrowing_clears_cache_and_notifies() {
        let v = view();
        let mut rx = v.bus().subscribe();
        v.sign_in(Some(granted())).unwrap();
        let first = v.refresh(vec![record("a", "secret", &[])]).await;
        assert_eq!(first.visible.len(), 1);
        assert_eq!(v.resolver.cache().len(), 1);

        v.narrow(&NarrowingSelection {
            classification: ClassificationLevel::Confidential,
            need_to_know: vec![],
            rel_to: vec!["USA".into()],
        })
        .unwrap();
        assert!(v.resolver.cache().is_empty());

        let second = v.refresh(vec![record("a", "secret", &[])]).await;
        assert!(second.visible.is_empty());
        assert!(second.epoch > first.epoch);

        let mut kinds_seen = Vec::new();
        while let Ok(env) = rx.try_recv() {
            kinds_seen.push(env.kind);
        }
        assert!(kinds_seen.iter().any(|k| k == kinds::CACHE_CLEARED));
        assert!(kinds_seen.iter().any(|k| k == kinds::ENTITLEMENTS_CHANGED));
        assert!(kinds_seen.iter().any(|k| k == kinds::BANNER_UPDATED));
    }

    #[tokio::test]
    async fn missing_entitlements_leave_no_access() {
        let v = view();
        assert_eq!(v.sign_in(None).unwrap_err(), EntitlementError::Missing);
        assert!(v.store().snapshot().is_no_access());
        let snap = v.refresh(vec![record("a", "unclassified", &[])]).await;
        assert!(snap.visible.is_empty());
        assert_eq!(snap.banner.level, ClassificationLevel::Unclassified);
    }
}
