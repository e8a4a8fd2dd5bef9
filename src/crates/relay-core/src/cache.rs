//! Cache Coordinator (§4.6): an in-memory, process-wide cache of collection,
//! single-entity, and full-graph responses, versioned per entity and
//! globally so clients can reason about optimistic consistency (O4).
//!
//! Adapted from a generic `Cache<K, V>` (insertion-timed entries, bounded
//! size, metrics) into a cache with a specific key scheme,
//! version bookkeeping, and cascade invalidation this service's write path
//! needs.

use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::model::EntityKind;

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    inserted_at: Instant,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self) -> bool {
        Instant::now() > self.expires_at
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub max_entries: usize,
    pub cleanup_period: Duration,
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            max_entries: 1000,
            cleanup_period: Duration::from_secs(300),
            enabled: true,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

#[derive(Debug, Clone)]
pub struct InvalidationEvent {
    pub pattern: String,
    pub global_version: u64,
}

const INVALIDATION_HISTORY_CAPACITY: usize = 256;

/// The cache coordinator. `get` takes only a read lock on storage (O3);
/// `set`/invalidation take the write lock and, for invalidation, also hold
/// `invalidation_lock` for the duration of the delete-then-bump-version
/// sequence so no reader can observe a bumped version with a still-stale
/// entry (O4).
pub struct Cache {
    storage: Arc<RwLock<HashMap<String, Entry>>>,
    insertion_order: Arc<Mutex<VecDeque<String>>>,
    global_version: Arc<AtomicU64>,
    entity_versions: Arc<RwLock<HashMap<String, u64>>>,
    events: Arc<Mutex<VecDeque<InvalidationEvent>>>,
    metrics: Arc<Mutex<CacheMetrics>>,
    invalidation_lock: Arc<Mutex<()>>,
    config: CacheConfig,
}

impl Cache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            storage: Arc::new(RwLock::new(HashMap::new())),
            insertion_order: Arc::new(Mutex::new(VecDeque::new())),
            global_version: Arc::new(AtomicU64::new(1)),
            entity_versions: Arc::new(RwLock::new(HashMap::new())),
            events: Arc::new(Mutex::new(VecDeque::new())),
            metrics: Arc::new(Mutex::new(CacheMetrics::default())),
            invalidation_lock: Arc::new(Mutex::new(())),
            config,
        }
    }

    pub fn collection_key(kind: EntityKind, limit: u32, cursor: Option<&str>, filter_sorted: &str) -> String {
        format!("{kind}:{limit}:{}:{filter_sorted}", cursor.unwrap_or(""))
    }

    pub fn entity_key(kind: EntityKind, id: Uuid, limit: u32, cursor: Option<&str>) -> String {
        format!("{kind}_{id}:{limit}:{}", cursor.unwrap_or(""))
    }

    pub fn graph_key() -> &'static str {
        "graph_complete"
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        if !self.config.enabled {
            return None;
        }
        let storage = self.storage.read().await;
        match storage.get(key) {
            Some(entry) if !entry.is_expired() => {
                let mut metrics = self.metrics.lock().await;
                metrics.hits += 1;
                Some(entry.value.clone())
            }
            _ => {
                let mut metrics = self.metrics.lock().await;
                metrics.misses += 1;
                None
            }
        }
    }

    pub async fn set(&self, key: impl Into<String>, value: Value) {
        if !self.config.enabled {
            return;
        }
        let key = key.into();
        let now = Instant::now();
        let entry = Entry {
            value,
            inserted_at: now,
            expires_at: now + self.config.ttl,
        };

        let mut storage = self.storage.write().await;
        if storage.len() >= self.config.max_entries && !storage.contains_key(&key) {
            self.evict_oldest(&mut storage).await;
        }
        storage.insert(key.clone(), entry);

        let mut order = self.insertion_order.lock().await;
        order.push_back(key);
    }

    async fn evict_oldest(&self, storage: &mut HashMap<String, Entry>) {
        let mut order = self.insertion_order.lock().await;
        while let Some(candidate) = order.pop_front() {
            if storage.remove(&candidate).is_some() {
                let mut metrics = self.metrics.lock().await;
                metrics.evictions += 1;
                return;
            }
        }
        // Fallback: order queue desynced from storage (shouldn't happen),
        // evict whatever insertion timestamp is oldest.
        if let Some(oldest_key) = storage
            .iter()
            .min_by_key(|(_, e)| e.inserted_at)
            .map(|(k, _)| k.clone())
        {
            storage.remove(&oldest_key);
        }
    }

    /// Simple glob matching for `invalidatePattern`: a leading `"*"`, a
    /// trailing `"*"`, or an exact `"prefix_id:..."` style literal.
    fn matches_pattern(key: &str, pattern: &str) -> bool {
        if let Some(suffix) = pattern.strip_prefix('*') {
            return key.ends_with(suffix);
        }
        if let Some(prefix) = pattern.strip_suffix('*') {
            return key.starts_with(prefix);
        }
        key == pattern
    }

    async fn delete_matching(&self, pattern: &str) -> usize {
        let mut storage = self.storage.write().await;
        let to_remove: Vec<String> = storage
            .keys()
            .filter(|k| Self::matches_pattern(k, pattern))
            .cloned()
            .collect();
        for key in &to_remove {
            storage.remove(key);
        }
        to_remove.len()
    }

    async fn record_event(&self, pattern: &str, global_version: u64) {
        let mut events = self.events.lock().await;
        events.push_back(InvalidationEvent {
            pattern: pattern.to_string(),
            global_version,
        });
        while events.len() > INVALIDATION_HISTORY_CAPACITY {
            events.pop_front();
        }
    }

    fn entity_version_key(kind: EntityKind, id: Uuid) -> String {
        format!("{kind}:{id}")
    }

    /// Invalidate every cache entry for one entity, bump its version and
    /// the global version, and record an event (§4.6).
    pub async fn invalidate_entity(&self, kind: EntityKind, id: Uuid) {
        let _guard = self.invalidation_lock.lock().await;
        let pattern = format!("{kind}_{id}:*");
        self.delete_matching(&pattern).await;

        let global = self.global_version.fetch_add(1, Ordering::SeqCst) + 1;
        let mut versions = self.entity_versions.write().await;
        versions.insert(Self::entity_version_key(kind, id), global);
        drop(versions);

        self.record_event(&pattern, global).await;
    }

    /// Invalidate an entity plus the caches of every related kind named in
    /// `related` (used by update/archive for the collection + related-kind
    /// cascade in §4.7).
    pub async fn invalidate_related(&self, kind: EntityKind, id: Uuid, related: &[(EntityKind, Vec<Uuid>)]) {
        self.invalidate_entity(kind, id).await;

        let _guard = self.invalidation_lock.lock().await;
        let collection_pattern = format!("{kind}:*");
        self.delete_matching(&collection_pattern).await;
        let graph_pattern = format!("{}*", Self::graph_key());
        self.delete_matching(&graph_pattern).await;

        let global = self.global_version.fetch_add(1, Ordering::SeqCst) + 1;
        self.record_event(&collection_pattern, global).await;
        self.record_event(&graph_pattern, global).await;
        drop(_guard);

        for (related_kind, ids) in related {
            let related_collection_pattern = format!("{related_kind}:*");
            {
                let _guard = self.invalidation_lock.lock().await;
                self.delete_matching(&related_collection_pattern).await;
                let global = self.global_version.fetch_add(1, Ordering::SeqCst) + 1;
                self.record_event(&related_collection_pattern, global).await;
            }
            for related_id in ids {
                self.invalidate_entity(*related_kind, *related_id).await;
            }
        }
    }

    pub async fn invalidate_pattern(&self, pattern: &str) {
        let _guard = self.invalidation_lock.lock().await;
        self.delete_matching(pattern).await;
        let global = self.global_version.fetch_add(1, Ordering::SeqCst) + 1;
        self.record_event(pattern, global).await;
    }

    pub async fn clear_all(&self) {
        let _guard = self.invalidation_lock.lock().await;
        let mut storage = self.storage.write().await;
        storage.clear();
        drop(storage);
        let mut order = self.insertion_order.lock().await;
        order.clear();
        drop(order);

        let global = self.global_version.fetch_add(1, Ordering::SeqCst) + 1;
        self.record_event("*", global).await;
    }

    pub fn global_version(&self) -> u64 {
        self.global_version.load(Ordering::SeqCst)
    }

    pub async fn entity_version(&self, kind: EntityKind, id: Uuid) -> Option<u64> {
        self.entity_versions.read().await.get(&Self::entity_version_key(kind, id)).copied()
    }

    pub async fn metrics(&self) -> CacheMetrics {
        self.metrics.lock().await.clone()
    }

    pub async fn recent_events(&self) -> Vec<InvalidationEvent> {
        self.events.lock().await.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache = Cache::new(CacheConfig::default());
        cache.set("k1", json!({"a": 1})).await;
        assert_eq!(cache.get("k1").await, Some(json!({"a": 1})));
    }

    #[tokio::test]
    async fn expired_entry_behaves_as_absent() {
        let cache = Cache::new(CacheConfig {
            ttl: Duration::from_millis(5),
            ..CacheConfig::default()
        });
        cache.set("k1", json!(1)).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.get("k1").await, None);
    }

    #[tokio::test]
    async fn invalidate_entity_removes_matching_keys_and_bumps_version() {
        let cache = Cache::new(CacheConfig::default());
        let id = Uuid::from_u128(1);
        let key = Cache::entity_key(EntityKind::Element, id, 20, None);
        cache.set(key.clone(), json!({"id": id})).await;

        let before = cache.global_version();
        cache.invalidate_entity(EntityKind::Element, id).await;

        assert_eq!(cache.get(&key).await, None);
        assert!(cache.global_version() > before);
        assert!(cache.entity_version(EntityKind::Element, id).await.is_some());
    }

    #[tokio::test]
    async fn invalidate_pattern_supports_leading_and_trailing_glob() {
        let cache = Cache::new(CacheConfig::default());
        cache.set("elements:20:", json!(1)).await;
        cache.set("elements:50:", json!(2)).await;
        cache.set("characters:20:", json!(3)).await;

        cache.invalidate_pattern("elements:*").await;

        assert_eq!(cache.get("elements:20:").await, None);
        assert_eq!(cache.get("elements:50:").await, None);
        assert!(cache.get("characters:20:").await.is_some());
    }

    #[tokio::test]
    async fn eviction_is_oldest_first_when_over_capacity() {
        let cache = Cache::new(CacheConfig {
            max_entries: 2,
            ..CacheConfig::default()
        });
        cache.set("a", json!(1)).await;
        cache.set("b", json!(2)).await;
        cache.set("c", json!(3)).await;

        assert_eq!(cache.get("a").await, None);
        assert!(cache.get("b").await.is_some());
        assert!(cache.get("c").await.is_some());
    }
}
