use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use serde_json::{Map, Value};

/// Decrypted identity fields of one object.
pub type StaticFields = Map<String, Value>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub entries: usize,
}

/// Process-lifetime memo of static payloads keyed by object id.
///
/// Only source types listed as cacheable are stored. Entries never expire;
/// [`ObjectCache::clear`] is the only way to drop them.
pub struct ObjectCache {
    entries: RwLock<HashMap<String, Arc<StaticFields>>>,
    cacheable: HashSet<String>,
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
}

impl ObjectCache {
    pub fn new<I, S>(cacheable_source_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: RwLock::new(HashMap::new()),
            cacheable: cacheable_source_types
                .into_iter()
                .map(Into::into)
                .filter(|s: &String| !s.trim().is_empty())
                .collect(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            inserts: AtomicU64::new(0),
        }
    }

    pub fn is_cacheable(&self, source_type_id: &str) -> bool {
        self.cacheable.contains(source_type_id)
    }

    pub fn get(&self, object_id: &str) -> Option<Arc<StaticFields>> {
        let hit = self.read().get(object_id).cloned();
        let counter = if hit.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        hit
    }

    /// Store a static payload if its source type is cacheable. Returns whether
    /// it was stored. A later insert for the same id overwrites the earlier one.
    pub fn insert(&self, object_id: &str, source_type_id: &str, fields: StaticFields) -> bool {
        if !self.is_cacheable(source_type_id) {
            return false;
        }
        self.write()
            .insert(object_id.to_string(), Arc::new(fields));
        self.inserts.fetch_add(1, Ordering::Relaxed);
        true
    }

    pub fn clear(&self) {
        let dropped = {
            let mut map = self.write();
            let n = map.len();
            map.clear();
            n
        };
        tracing::info!(dropped, "object cache cleared");
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<StaticFields>>> {
        self.entries.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<StaticFields>>> {
        self.entries.write().unwrap_or_else(|p| p.into_inner())
    }
}

impl Default for ObjectCache {
    fn default() -> Self {
        Self::new(Vec::<String>::new())
    }
}
