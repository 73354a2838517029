//! In-process session cache with per-entry idle timeout and LRU capacity.

use std::num::NonZeroUsize;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::backend::{CacheKind, CacheResult, QueryableCache, SessionCache, SessionRow};
use crate::entity::SessionEntity;

/// Entry stored in the cache.
#[derive(Debug, Clone)]
struct Slot {
    entity: SessionEntity,

    /// Evict once unaccessed for this long.
    idle_timeout: Option<Duration>,

    /// Last put or get.
    touched: Instant,
}

impl Slot {
    fn is_idle(&self, now: Instant) -> bool {
        match self.idle_timeout {
            None => false,
            Some(timeout) => now.duration_since(self.touched) >= timeout,
        }
    }
}

/// Embedded cache holding live entities.
///
/// Idle timeouts behave like a max-idle setting: every `get` or `put`
/// restarts the timer, and an idle entry disappears silently the next time
/// anything looks at it. With a capacity, the least recently used entry is
/// dropped to make room.
pub struct MemoryCache {
    name: String,
    kind: CacheKind,
    entries: Mutex<LruCache<String, Slot>>,
}

impl MemoryCache {
    /// Create an unbounded cache.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: CacheKind::Embedded,
            entries: Mutex::new(LruCache::unbounded()),
        }
    }

    /// Create a cache holding at most `capacity` entries.
    pub fn with_capacity(name: impl Into<String>, capacity: NonZeroUsize) -> Self {
        Self {
            name: name.into(),
            kind: CacheKind::Embedded,
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Override the declared cache kind.
    pub fn with_kind(mut self, kind: CacheKind) -> Self {
        self.kind = kind;
        self
    }

    /// Number of entries, including idle ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drop every idle entry now. Returns how many were dropped.
    pub fn purge_idle(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let idle: Vec<String> = entries
            .iter()
            .filter(|(_, slot)| slot.is_idle(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &idle {
            entries.pop(key);
        }
        if !idle.is_empty() {
            debug!(cache = %self.name, count = idle.len(), "Purged idle sessions");
        }
        idle.len()
    }
}

#[async_trait]
impl SessionCache for MemoryCache {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> CacheKind {
        self.kind
    }

    async fn get(&self, key: &str) -> CacheResult<Option<SessionEntity>> {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        if entries.peek(key).is_some_and(|slot| slot.is_idle(now)) {
            trace!(cache = %self.name, key, "Session idle, evicting");
            entries.pop(key);
            return Ok(None);
        }

        Ok(entries.get_mut(key).map(|slot| {
            slot.touched = now;
            slot.entity.clone()
        }))
    }

    async fn put(
        &self,
        key: &str,
        entity: SessionEntity,
        idle_timeout: Option<Duration>,
    ) -> CacheResult<()> {
        let slot = Slot {
            entity,
            idle_timeout,
            touched: Instant::now(),
        };
        let mut entries = self.entries.lock();
        if let Some((evicted, _)) = entries.push(key.to_string(), slot) {
            if evicted != key {
                debug!(cache = %self.name, key = %evicted, "Evicting LRU session to make room");
            }
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> CacheResult<Option<SessionEntity>> {
        let now = Instant::now();
        let removed = self.entries.lock().pop(key);
        // An idle entry was already gone as far as callers can tell.
        Ok(removed
            .filter(|slot| !slot.is_idle(now))
            .map(|slot| slot.entity))
    }

    async fn expiry(&self, key: &str) -> CacheResult<Option<i64>> {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        if entries.peek(key).is_some_and(|slot| slot.is_idle(now)) {
            entries.pop(key);
            return Ok(None);
        }

        Ok(entries.get_mut(key).map(|slot| {
            slot.touched = now;
            slot.entity.expiry
        }))
    }
}

#[async_trait]
impl QueryableCache for MemoryCache {
    async fn query(
        &self,
        context_filter: Option<&str>,
        expiry_upper_bound: i64,
    ) -> CacheResult<Vec<SessionRow>> {
        let now = Instant::now();
        let entries = self.entries.lock();
        Ok(entries
            .iter()
            .filter(|(_, slot)| !slot.is_idle(now))
            .map(|(_, slot)| &slot.entity)
            .filter(|entity| context_filter.is_none_or(|ctx| entity.context_path == ctx))
            .filter(|entity| entity.expiry <= expiry_upper_bound)
            .map(|entity| SessionRow {
                id: entity.id.clone(),
                context_path: entity.context_path.clone(),
                virtual_host: entity.virtual_host.clone(),
                expiry: entity.expiry,
            })
            .collect())
    }
}
