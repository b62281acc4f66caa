use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use cop_core::codec::{CodecKind, NANOTDF_MAGIC};
use cop_core::{
    ClassificationLevel, CodecError, CryptoSdk, EntitlementStore, NarrowingSelection,
    ObjectCache, ObjectResolver, SituationalView, WorkerPool,
};
use cop_events::{kinds, Bus};
use cop_protocol::{ClientConfig, RawRecord, UserCredentials, WorkerInit};
use serde_json::json;
use tokio::time::{timeout, Duration};

const NS: &str = "https://demo.com/attr";

fn fqn(category: &str, value: &str) -> String {
    format!("{NS}/{category}/value/{value}")
}

/// Fake SDK: TDF3 "ciphertext" is the JSON plaintext, NanoTDF is the magic
/// followed by it. A `!` anywhere fails the decrypt.
#[derive(Default)]
struct FakeSdk {
    calls: AtomicUsize,
    nano_calls: AtomicUsize,
}

#[async_trait]
impl CryptoSdk for FakeSdk {
    async fn decrypt(
        &self,
        codec: CodecKind,
        ciphertext: Vec<u8>,
        session: &WorkerInit,
    ) -> Result<String, CodecError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if session.user.access_token.is_empty() {
            return Err(CodecError::Auth("no access token".into()));
        }
        let body = match codec {
            CodecKind::NanoTdf => {
                self.nano_calls.fetch_add(1, Ordering::SeqCst);
                &ciphertext[NANOTDF_MAGIC.len()..]
            }
            CodecKind::Tdf3 => &ciphertext[..],
        };
        if body.contains(&b'!') {
            return Err(CodecError::KeyAccess("rewrap refused".into()));
        }
        Ok(String::from_utf8_lossy(body).into_owned())
    }
}

fn session() -> WorkerInit {
    WorkerInit {
        config: ClientConfig::default(),
        user: UserCredentials {
            access_token: "access".into(),
            refresh_token: "refresh".into(),
        },
    }
}

fn record(id: &str, source: &str, level: &str, nano: bool) -> RawRecord {
    let mut blob = Vec::new();
    if nano {
        blob.extend_from_slice(&NANOTDF_MAGIC);
    }
    blob.extend(
        serde_json::to_vec(&json!({
            "name": id,
            "attrClassification": [fqn("classification", level)],
            "attrNeedToKnow": [],
            "attrRelTo": [fqn("relto", "usa")],
        }))
        .unwrap(),
    );
    RawRecord {
        id: id.into(),
        source_type_id: source.into(),
        ciphertext_blob: blob,
        dynamic_plaintext_fields: Some(json!({"speed": 7}).to_string()),
        ..Default::default()
    }
}

struct Harness {
    sdk: Arc<FakeSdk>,
    pool: Arc<WorkerPool>,
    view: SituationalView<WorkerPool>,
}

fn harness(capacity: usize) -> Harness {
    let sdk = Arc::new(FakeSdk::default());
    let pool = Arc::new(WorkerPool::new(capacity, sdk.clone(), session()).unwrap());
    let cache = Arc::new(ObjectCache::new(["track"]));
    let view = SituationalView::new(
        Arc::new(EntitlementStore::new()),
        ObjectResolver::new(pool.clone(), cache),
        Bus::new(64),
    );
    Harness { sdk, pool, view }
}

fn entitlements() -> Vec<String> {
    vec![
        fqn("classification", "unclassified"),
        fqn("classification", "confidential"),
        fqn("classification", "secret"),
        fqn("relto", "usa"),
    ]
}

#[tokio::test]
async fn end_to_end_refresh_through_worker_pool() {
    let h = harness(4);
    h.view.sign_in(Some(entitlements())).unwrap();

    let records = vec![
        record("t1", "track", "secret", false),
        record("t2", "track", "confidential", true),
        record("s1", "sensor", "topsecret", false),
        record("bad", "sensor", "secret!", false),
    ];
    let snap = timeout(Duration::from_secs(5), h.view.refresh(records))
        .await
        .expect("refresh should finish");

    let mut visible: Vec<&str> = snap.visible.iter().map(|o| o.id.as_str()).collect();
    visible.sort_unstable();
    assert_eq!(visible, vec!["t1", "t2"]);
    assert_eq!(snap.blocked_count(), 2);
    assert_eq!(snap.banner.level, ClassificationLevel::Secret);
    assert_eq!(snap.banner.display(), "SECRET//REL TO USA");
    assert!(snap.visible.iter().all(|o| o.fields()["speed"] == 7));

    assert_eq!(h.sdk.calls.load(Ordering::SeqCst), 4);
    assert_eq!(h.sdk.nano_calls.load(Ordering::SeqCst), 1);
    assert!(h.pool.len() <= 4);
}

#[tokio::test]
async fn cached_tracks_skip_the_pool_until_narrowing() {
    let h = harness(2);
    let mut events = h.view.bus().subscribe();
    h.view.sign_in(Some(entitlements())).unwrap();

    let batch = || {
        vec![
            record("t1", "track", "secret", false),
            record("s1", "sensor", "confidential", false),
        ]
    };
    let first = timeout(Duration::from_secs(5), h.view.refresh(batch()))
        .await
        .unwrap();
    assert_eq!(first.visible.len(), 2);
    assert_eq!(h.sdk.calls.load(Ordering::SeqCst), 2);

    // track served from cache; sensor is not cacheable
    timeout(Duration::from_secs(5), h.view.refresh(batch()))
        .await
        .unwrap();
    assert_eq!(h.sdk.calls.load(Ordering::SeqCst), 3);

    h.view
        .narrow(&NarrowingSelection {
            classification: ClassificationLevel::Confidential,
            need_to_know: vec![],
            rel_to: vec!["usa".into()],
        })
        .unwrap();
    let narrowed = timeout(Duration::from_secs(5), h.view.refresh(batch()))
        .await
        .unwrap();
    assert_eq!(h.sdk.calls.load(Ordering::SeqCst), 5);
    let ids: Vec<&str> = narrowed.visible.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["s1"]);
    assert_eq!(narrowed.banner.display(), "CONFIDENTIAL//REL TO USA");

    let mut seen = Vec::new();
    while let Ok(env) = events.try_recv() {
        seen.push(env.kind);
    }
    assert_eq!(
        seen.iter().filter(|k| *k == kinds::CACHE_CLEARED).count(),
        2,
        "sign-in and narrowing each clear the cache"
    );
}

#[tokio::test]
async fn pool_stays_bounded_under_load() {
    let h = harness(3);
    h.view.sign_in(Some(entitlements())).unwrap();
    let records: Vec<RawRecord> = (0..24)
        .map(|i| record(&format!("s{i}"), "sensor", "unclassified", i % 2 == 0))
        .collect();
    let snap = timeout(Duration::from_secs(5), h.view.refresh(records))
        .await
        .unwrap();
    assert_eq!(snap.visible.len(), 24);
    assert_eq!(h.pool.len(), 3);
    assert_eq!(h.sdk.calls.load(Ordering::SeqCst), 24);
}
