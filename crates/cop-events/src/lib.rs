use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

/// Event kinds published by the situational view.
pub mod kinds {
    pub const ENTITLEMENTS_CHANGED: &str = "entitlements.changed";
    pub const CACHE_CLEARED: &str = "cache.cleared";
    pub const BANNER_UPDATED: &str = "banner.updated";
}

/// Minimal event envelope (RFC3339 time).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Envelope {
    pub time: String,
    pub kind: String,
    pub payload: Value,
}

/// Broadcast bus that UI consumers subscribe to instead of polling state.
#[derive(Clone)]
pub struct Bus {
    tx: broadcast::Sender<Envelope>,
}

impl Bus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn publish<T: Serialize>(&self, kind: &str, payload: &T) {
        let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let val =
            serde_json::to_value(payload).unwrap_or_else(|_| serde_json::json!({"_ser":"error"}));
        // No subscribers is not an error; the event is simply dropped.
        if self
            .tx
            .send(Envelope {
                time: now,
                kind: kind.to_string(),
                payload: val,
            })
            .is_err()
        {
            tracing::trace!(kind, "event published with no subscribers");
        }
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new(64)
    }
}
