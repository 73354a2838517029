//! Integration tests for ClusteredSessionStore against embedded, networked
//! and failing caches.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use shoal_session::{
    CacheError, CacheKind, CacheResult, ClusteredSessionStore, Error, MemoryCache,
    QueryCapability, QueryableCache, SessionCache, SessionContext, SessionDataStore,
    SessionEntity, SessionRow, StoreConfig, key, now_millis,
};

/// Networked cache stand-in: records cross a byte boundary in wire form.
#[derive(Default)]
struct WireCache {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl SessionCache for WireCache {
    fn name(&self) -> &str {
        "wire"
    }

    fn kind(&self) -> CacheKind {
        CacheKind::Remote
    }

    async fn get(&self, key: &str) -> CacheResult<Option<SessionEntity>> {
        let Some(bytes) = self.entries.lock().get(key).cloned() else {
            return Ok(None);
        };
        SessionEntity::from_wire(&bytes)
            .map(Some)
            .map_err(|e| CacheError::Codec(e.to_string()))
    }

    async fn put(
        &self,
        key: &str,
        entity: SessionEntity,
        _idle_timeout: Option<Duration>,
    ) -> CacheResult<()> {
        let bytes = entity
            .to_wire()
            .map_err(|e| CacheError::Codec(e.to_string()))?;
        self.entries.lock().insert(key.to_string(), bytes);
        Ok(())
    }

    async fn remove(&self, key: &str) -> CacheResult<Option<SessionEntity>> {
        match self.entries.lock().remove(key) {
            Some(bytes) => SessionEntity::from_wire(&bytes)
                .map(Some)
                .map_err(|e| CacheError::Codec(e.to_string())),
            None => Ok(None),
        }
    }
}

/// Embedded cache whose operations on chosen keys fail.
struct FailingCache {
    inner: MemoryCache,
    failing_keys: HashSet<String>,
    fail_puts: bool,
}

impl FailingCache {
    fn new(failing_keys: impl IntoIterator<Item = String>) -> Self {
        Self {
            inner: MemoryCache::new("failing"),
            failing_keys: failing_keys.into_iter().collect(),
            fail_puts: false,
        }
    }

    fn check(&self, key: &str) -> CacheResult<()> {
        if self.failing_keys.contains(key) {
            Err(CacheError::Unavailable(format!("injected failure for {key}")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SessionCache for FailingCache {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn kind(&self) -> CacheKind {
        CacheKind::Embedded
    }

    async fn get(&self, key: &str) -> CacheResult<Option<SessionEntity>> {
        self.check(key)?;
        self.inner.get(key).await
    }

    async fn put(
        &self,
        key: &str,
        entity: SessionEntity,
        idle_timeout: Option<Duration>,
    ) -> CacheResult<()> {
        if self.fail_puts {
            return Err(CacheError::Timeout(Duration::from_secs(5)));
        }
        self.inner.put(key, entity, idle_timeout).await
    }

    async fn remove(&self, key: &str) -> CacheResult<Option<SessionEntity>> {
        self.check(key)?;
        self.inner.remove(key).await
    }
}

#[async_trait]
impl QueryableCache for FailingCache {
    async fn query(
        &self,
        context_filter: Option<&str>,
        expiry_upper_bound: i64,
    ) -> CacheResult<Vec<SessionRow>> {
        self.inner.query(context_filter, expiry_upper_bound).await
    }
}

fn context(worker: &str) -> SessionContext {
    SessionContext::new("/app", Some("www"), worker)
}

fn embedded_store(cache: Arc<MemoryCache>, worker: &str) -> ClusteredSessionStore {
    ClusteredSessionStore::builder(context(worker))
        .cache(cache.clone())
        .query(QueryCapability::embedded(cache))
        .start()
        .unwrap()
}

fn entity_with_expiry(
    store: &ClusteredSessionStore,
    id: &str,
    expiry: i64,
) -> SessionEntity {
    let mut e = store.new_entity(id, 1_000, 1_000, 1_000, 60_000);
    e.expiry = expiry;
    e
}

fn ids(items: &[&str]) -> HashSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_store_then_load_round_trip() {
    let store = embedded_store(Arc::new(MemoryCache::new("sessions")), "node-a");
    assert!(!store.is_passivating());

    let before = now_millis();
    let mut e = store.new_entity("s1", 1_000, 2_000, 1_500, 30_000);
    e.set_attribute("cart", json!({"items": [1, 2]})).unwrap();
    store.store("s1", &e, 0).await.unwrap();

    let loaded = store.load("s1").await.unwrap().unwrap();
    assert_eq!(loaded.last_node.as_deref(), Some("node-a"));
    assert!(loaded.last_saved >= before);

    // Everything else comes back as written.
    e.last_node = loaded.last_node.clone();
    e.last_saved = loaded.last_saved;
    assert_eq!(loaded, e);
    assert!(store.load("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_passivating_round_trip_through_wire() {
    let store = ClusteredSessionStore::builder(context("node-a"))
        .cache(Arc::new(WireCache::default()))
        .start()
        .unwrap();
    assert!(store.is_passivating());

    let mut e = store.new_entity("s1", 1_000, 1_000, 1_000, 30_000);
    e.set_attribute("user", json!({"name": "ada"})).unwrap();
    e.set_attribute("visits", 3).unwrap();
    store.store("s1", &e, 0).await.unwrap();

    let loaded = store.load("s1").await.unwrap().unwrap();
    assert!(!loaded.is_passivated());
    assert_eq!(loaded.attribute_as::<u32>("visits").unwrap(), Some(3));
    assert_eq!(loaded.last_node.as_deref(), Some("node-a"));

    e.last_node = loaded.last_node.clone();
    e.last_saved = loaded.last_saved;
    assert_eq!(loaded, e);
}

#[tokio::test]
async fn test_corrupt_payload_is_unreadable() {
    let cache = Arc::new(WireCache::default());
    let store = ClusteredSessionStore::builder(context("node-a"))
        .cache(cache.clone())
        .start()
        .unwrap();

    let mut e = store.new_entity("s1", 1_000, 1_000, 1_000, 30_000);
    e.set_attribute("a", 1).unwrap();
    let mut wire: serde_json::Value = serde_json::from_slice(&e.to_wire().unwrap()).unwrap();
    wire["attributes"]["data"] = json!([110, 111, 112, 101]);
    cache.entries.lock().insert(
        store.cache_key("s1"),
        serde_json::to_vec(&wire).unwrap(),
    );

    match store.load("s1").await {
        Err(Error::Unreadable { id, context, .. }) => {
            assert_eq!(id, "s1");
            assert_eq!(context, "/app@www");
        }
        other => panic!("expected unreadable session, got {other:?}"),
    }
}

#[tokio::test]
async fn test_cache_failure_on_load_is_unreadable() {
    let store = ClusteredSessionStore::builder(context("node-a"))
        .cache(Arc::new(FailingCache::new([key::encode("/app", "www", "bad")])))
        .start()
        .unwrap();

    assert!(matches!(
        store.load("bad").await,
        Err(Error::Unreadable { .. })
    ));
}

#[tokio::test]
async fn test_store_failure_propagates() {
    let mut cache = FailingCache::new([]);
    cache.fail_puts = true;
    let store = ClusteredSessionStore::builder(context("node-a"))
        .cache(Arc::new(cache))
        .start()
        .unwrap();

    let e = store.new_entity("s1", 1_000, 1_000, 1_000, 30_000);
    assert!(matches!(
        store.store("s1", &e, 0).await,
        Err(Error::Persistence(CacheError::Timeout(_)))
    ));
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let store = embedded_store(Arc::new(MemoryCache::new("sessions")), "node-a");
    let e = store.new_entity("s1", 1_000, 1_000, 1_000, 30_000);
    store.store("s1", &e, 0).await.unwrap();

    assert!(store.delete("s1").await.unwrap());
    assert!(!store.delete("s1").await.unwrap());
    assert!(!store.delete("never-existed").await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_idle_timeout_evicts_without_scavenging() {
    let cache = Arc::new(MemoryCache::new("sessions"));
    let store = ClusteredSessionStore::builder(context("node-a"))
        .cache(cache)
        .config(StoreConfig::new().with_idle_timeout_secs(30))
        .start()
        .unwrap();

    let mortal = store.new_entity("mortal", 1_000, 1_000, 1_000, 60_000);
    let immortal = store.new_entity("immortal", 1_000, 1_000, 1_000, -1);
    store.store("mortal", &mortal, 0).await.unwrap();
    store.store("immortal", &immortal, 0).await.unwrap();

    tokio::time::advance(Duration::from_secs(29)).await;
    assert!(store.load("mortal").await.unwrap().is_some());

    tokio::time::advance(Duration::from_secs(31)).await;
    assert!(store.load("mortal").await.unwrap().is_none());
    assert!(store.load("immortal").await.unwrap().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_zero_idle_timeout_sets_no_ttl() {
    let store = embedded_store(Arc::new(MemoryCache::new("sessions")), "node-a");
    let e = store.new_entity("s1", 1_000, 1_000, 1_000, 60_000);
    store.store("s1", &e, 0).await.unwrap();

    tokio::time::advance(Duration::from_secs(24 * 3600)).await;
    assert!(store.load("s1").await.unwrap().is_some());
}

#[tokio::test]
async fn test_exists() {
    let store = embedded_store(Arc::new(MemoryCache::new("sessions")), "node-a");
    let now = now_millis();

    let immortal = entity_with_expiry(&store, "immortal", 0);
    let past = entity_with_expiry(&store, "past", now - 1_000);
    let future = entity_with_expiry(&store, "future", now + 3_600_000);
    for e in [&immortal, &past, &future] {
        store.store(&e.id, e, 0).await.unwrap();
    }

    assert!(!store.exists("absent").await.unwrap());
    assert!(store.exists("immortal").await.unwrap());
    assert!(!store.exists("past").await.unwrap());
    assert!(store.exists("future").await.unwrap());
}

#[tokio::test]
async fn test_scan_candidates_respects_ownership() {
    let cache = Arc::new(MemoryCache::new("sessions"));
    let node_a = embedded_store(cache.clone(), "A");
    let node_b = embedded_store(cache, "B");

    let e = entity_with_expiry(&node_a, "s1", 5_000);
    node_a.store("s1", &e, 0).await.unwrap();

    let candidates = ids(&["s1"]);
    assert!(node_b.scan_candidates(&candidates, 10_000).await.is_empty());
    assert_eq!(node_a.scan_candidates(&candidates, 10_000).await, candidates);

    // Not yet due, even for the owner.
    assert!(node_a.scan_candidates(&candidates, 4_999).await.is_empty());
}

#[tokio::test]
async fn test_scan_candidates_reports_absent_and_skips_failures() {
    let failing = key::encode("/app", "www", "broken");
    let cache = Arc::new(FailingCache::new([failing]));
    let store = ClusteredSessionStore::builder(context("A"))
        .cache(cache.clone())
        .start()
        .unwrap();

    let immortal = entity_with_expiry(&store, "immortal", 0);
    let due = entity_with_expiry(&store, "due", 100);
    store.store("immortal", &immortal, 0).await.unwrap();
    store.store("due", &due, 0).await.unwrap();

    let expired = store
        .scan_candidates(&ids(&["gone", "broken", "immortal", "due"]), 1_000)
        .await;
    assert_eq!(expired, ids(&["gone", "due"]));
}

#[tokio::test]
async fn test_no_query_capability_degrades() {
    let cache = Arc::new(MemoryCache::new("sessions"));
    let store = ClusteredSessionStore::builder(context("A"))
        .cache(cache.clone())
        .start()
        .unwrap();

    let e = entity_with_expiry(&store, "s1", 100);
    store.store("s1", &e, 0).await.unwrap();

    assert!(store.scan_all_for_context(1_000).await.unwrap().is_empty());
    assert_eq!(store.clean_orphans(1_000).await.unwrap(), 0);
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn test_scan_all_for_context_ignores_ownership() {
    let cache = Arc::new(MemoryCache::new("sessions"));
    let node_a = embedded_store(cache.clone(), "A");
    let other_context = ClusteredSessionStore::builder(SessionContext::new("/other", Some("www"), "A"))
        .cache(cache.clone())
        .start()
        .unwrap();

    let node_b = embedded_store(cache.clone(), "B");
    let node_c = embedded_store(cache.clone(), "C");
    for (id, writer, expiry) in [("a", &node_a, 100), ("b", &node_b, 200), ("c", &node_c, 0), ("d", &node_a, 5_000)] {
        let e = entity_with_expiry(writer, id, expiry);
        writer.store(id, &e, 0).await.unwrap();
    }
    let elsewhere = entity_with_expiry(&other_context, "x", 100);
    other_context.store("x", &elsewhere, 0).await.unwrap();

    assert_eq!(
        node_a.scan_all_for_context(1_000).await.unwrap(),
        ids(&["a", "b"])
    );
}

#[tokio::test]
async fn test_clean_orphans_across_contexts() {
    let cache = Arc::new(MemoryCache::new("sessions"));
    let t = 10_000;

    let contexts = [("/app", "www"), ("/shop", "www"), ("/app", "admin")];
    for (i, (path, host)) in contexts.into_iter().enumerate() {
        let store = ClusteredSessionStore::builder(SessionContext::new(path, Some(host), "gone"))
            .cache(cache.clone())
            .start()
            .unwrap();
        for (id, expiry) in [("due", t - 1), ("edge", t), ("immortal", 0), ("later", t + 1)] {
            let id = format!("{id}-{i}");
            let e = entity_with_expiry(&store, &id, expiry);
            store.store(&id, &e, 0).await.unwrap();
        }
    }

    let sweeper = embedded_store(cache.clone(), "survivor");
    assert_eq!(sweeper.clean_orphans(t).await.unwrap(), 6);

    let mut left: Vec<String> = cache
        .query(None, i64::MAX)
        .await
        .unwrap()
        .into_iter()
        .map(|row| row.id)
        .collect();
    left.sort();
    assert_eq!(
        left,
        vec!["immortal-0", "immortal-1", "immortal-2", "later-0", "later-1", "later-2"]
    );
}

#[tokio::test]
async fn test_clean_orphans_survives_failed_delete() {
    let poisoned = key::encode("/app", "www", "s3");
    let cache = Arc::new(FailingCache::new([poisoned]));
    let store = ClusteredSessionStore::builder(context("A"))
        .cache(cache.clone())
        .query(QueryCapability::embedded(cache.clone()))
        .start()
        .unwrap();

    for i in 1..=5 {
        let id = format!("s{i}");
        let e = entity_with_expiry(&store, &id, 100);
        store.store(&id, &e, 0).await.unwrap();
    }

    assert_eq!(store.clean_orphans(1_000).await.unwrap(), 4);
    let left = cache.query(None, i64::MAX).await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].id, "s3");
}

#[tokio::test]
async fn test_hundred_session_orphan_scenario() {
    let cache = Arc::new(MemoryCache::new("sessions"));
    let store = embedded_store(cache.clone(), "node-a");
    let now = now_millis();

    for i in 1..=100 {
        let id = format!("s{i}");
        let expiry = if i == 50 { 0 } else { now - 1_000 };
        let e = entity_with_expiry(&store, &id, expiry);
        store.store(&id, &e, 0).await.unwrap();
    }

    assert_eq!(store.clean_orphans(now).await.unwrap(), 99);
    assert_eq!(cache.len(), 1);
    assert!(store.load("s50").await.unwrap().is_some());
}

#[tokio::test]
async fn test_store_is_shareable_across_tasks() {
    let store = Arc::new(embedded_store(Arc::new(MemoryCache::new("sessions")), "A"));

    let mut handles = Vec::new();
    for i in 0..8 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let id = format!("s{i}");
            let e = store.new_entity(&id, 0, 0, 0, 60_000);
            store.store(&id, &e, 0).await.unwrap();
            store.delete(&id).await.unwrap()
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap());
    }
}
