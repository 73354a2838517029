//! Clustered session store.
//!
//! Many nodes share session records through one backing cache. There is no
//! lock: a node only declares a session expired when it was the last node
//! to write it, and every removal is idempotent, so two nodes racing on the
//! same record cost at most a duplicate delete.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use tracing::{debug, trace, warn};

use crate::backend::SessionCache;
use crate::config::StoreConfig;
use crate::context::SessionContext;
use crate::entity::SessionEntity;
use crate::error::{Error, Result};
use crate::query::QueryCapability;
use crate::{key, now_millis, passivation};

/// Persistence surface the session lifecycle manager calls into.
///
/// Any backend can sit behind this trait; [`ClusteredSessionStore`] is the
/// shared-cache implementation.
#[async_trait]
pub trait SessionDataStore: Send + Sync {
    /// Load a session. `Ok(None)` if it does not exist.
    async fn load(&self, id: &str) -> Result<Option<SessionEntity>>;

    /// Persist a session. The stored record carries this node as
    /// `last_node` and the save time as `last_saved`; `last_save_time` is
    /// when it was previously saved, `0` if never.
    async fn store(&self, id: &str, entity: &SessionEntity, last_save_time: i64) -> Result<()>;

    /// Remove a session. Returns whether a record existed.
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Whether a session exists and has not expired.
    async fn exists(&self, id: &str) -> Result<bool>;

    /// Of the candidates this node tracks, those expired at `time`.
    async fn scan_candidates(&self, candidates: &HashSet<String>, time: i64) -> HashSet<String>;

    /// Every session of this context expired at `time`, whoever wrote it.
    async fn scan_all_for_context(&self, time: i64) -> Result<HashSet<String>>;

    /// Remove sessions of every context expired at `time_limit`.
    async fn clean_orphans(&self, time_limit: i64) -> Result<usize>;

    /// Create an entity scoped to this store's context.
    fn new_entity(
        &self,
        id: &str,
        created: i64,
        accessed: i64,
        last_accessed: i64,
        max_inactive_ms: i64,
    ) -> SessionEntity;

    /// Whether loaded sessions arrive with serialized attributes.
    fn is_passivating(&self) -> bool;
}

/// Builder for [`ClusteredSessionStore`].
pub struct StoreBuilder {
    context: SessionContext,
    cache: Option<Arc<dyn SessionCache>>,
    query: QueryCapability,
    config: StoreConfig,
}

impl StoreBuilder {
    /// Set the backing cache. Required.
    pub fn cache(mut self, cache: Arc<dyn SessionCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn query(mut self, query: QueryCapability) -> Self {
        self.query = query;
        self
    }

    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Start the store. Fails if no cache was given.
    pub fn start(self) -> Result<ClusteredSessionStore> {
        let cache = self
            .cache
            .ok_or_else(|| Error::Configuration("no cache".to_string()))?;

        let passivating = passivation::detect(cache.as_ref(), self.config.passivating);

        debug!(
            context = %self.context,
            worker = self.context.worker_name(),
            cache = cache.name(),
            passivating,
            query = ?self.query,
            idle_timeout_secs = self.config.idle_timeout_secs,
            "Clustered session store started"
        );

        Ok(ClusteredSessionStore {
            context: self.context,
            cache,
            query: self.query,
            config: self.config,
            passivating,
            last_expiry_check: AtomicI64::new(0),
            last_orphan_sweep: AtomicI64::new(0),
        })
    }
}

/// Session store backed by a cache shared across the cluster.
pub struct ClusteredSessionStore {
    context: SessionContext,
    cache: Arc<dyn SessionCache>,
    query: QueryCapability,
    config: StoreConfig,
    passivating: bool,

    /// Time of the previous [`get_expired`](Self::get_expired) pass, 0 if none.
    last_expiry_check: AtomicI64,
    /// Time of the previous orphan sweep, 0 if none.
    last_orphan_sweep: AtomicI64,
}

impl ClusteredSessionStore {
    /// Start building a store for `context`.
    pub fn builder(context: SessionContext) -> StoreBuilder {
        StoreBuilder {
            context,
            cache: None,
            query: QueryCapability::None,
            config: StoreConfig::default(),
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn idle_timeout_secs(&self) -> u64 {
        self.config.idle_timeout_secs
    }

    pub fn query_capability(&self) -> &QueryCapability {
        &self.query
    }

    /// Cache key of a session in this store's context.
    pub fn cache_key(&self, id: &str) -> String {
        key::encode(
            self.context.context_path(),
            self.context.virtual_host(),
            id,
        )
    }

    /// One scavenging pass, run periodically by the lifecycle manager.
    ///
    /// Combines a context-wide scan (once per grace period, looking a grace
    /// period back; three on the very first pass so nodes starting together
    /// do not pick up each other's live sessions), the owner check over
    /// `candidates`, and an orphan sweep every ten grace periods. Failures
    /// of the context-wide scan and the sweep are logged and skipped.
    pub async fn get_expired(&self, candidates: &HashSet<String>, now: i64) -> HashSet<String> {
        let grace = i64::try_from(self.config.grace_period.as_millis()).unwrap_or(i64::MAX);
        let mut expired = HashSet::new();

        let last_check = self.last_expiry_check.load(Ordering::Acquire);
        let scan_upper_bound = if last_check <= 0 {
            Some(now.saturating_sub(grace.saturating_mul(3)))
        } else if now.saturating_sub(last_check) > grace {
            Some(now.saturating_sub(grace))
        } else {
            None
        };

        if let Some(bound) = scan_upper_bound {
            match self.scan_all_for_context(bound).await {
                Ok(ids) => expired.extend(ids),
                Err(e) => warn!(context = %self.context, error = %e, "Error finding expired sessions for context"),
            }
        }

        expired.extend(self.scan_candidates(candidates, now).await);

        let last_sweep = self.last_orphan_sweep.load(Ordering::Acquire);
        if now.saturating_sub(last_sweep) > grace.saturating_mul(10) {
            if let Err(e) = self.clean_orphans(now.saturating_sub(grace.saturating_mul(10))).await {
                warn!(error = %e, "Error cleaning orphan sessions");
            }
            self.last_orphan_sweep.store(now, Ordering::Release);
        }

        self.last_expiry_check.store(now, Ordering::Release);
        expired
    }

    fn unreadable(&self, id: &str, source: impl std::error::Error + Send + Sync + 'static) -> Error {
        Error::Unreadable {
            id: id.to_string(),
            context: self.context.to_string(),
            source: Box::new(source),
        }
    }
}

#[async_trait]
impl SessionDataStore for ClusteredSessionStore {
    async fn load(&self, id: &str) -> Result<Option<SessionEntity>> {
        trace!(session_id = %id, "Loading session from cache");

        let mut entity = match self.cache.get(&self.cache_key(id)).await {
            Ok(Some(entity)) => entity,
            Ok(None) => return Ok(None),
            Err(e) => return Err(self.unreadable(id, e)),
        };

        if self.passivating {
            trace!(session_id = %id, "Deserializing session attributes");
            entity
                .deserialize_attributes()
                .map_err(|e| self.unreadable(id, e))?;
        }

        Ok(Some(entity))
    }

    async fn store(&self, id: &str, entity: &SessionEntity, last_save_time: i64) -> Result<()> {
        // Mortal sessions get a cache-level idle timeout as well, so the cache
        // evicts them even if no node ever scavenges. No listener sees that.
        let idle_timeout = if entity.max_inactive_ms > 0 {
            self.config.idle_timeout()
        } else {
            None
        };

        // The writer becomes the advisory owner of the record.
        let mut record = entity.clone();
        record.last_node = Some(self.context.worker_name().to_string());
        record.last_saved = now_millis();
        let expiry = record.expiry;

        self.cache
            .put(&self.cache_key(id), record, idle_timeout)
            .await?;

        debug!(
            session_id = %id,
            worker = self.context.worker_name(),
            expiry,
            last_save_time,
            idle_timeout = ?idle_timeout,
            "Session saved to cache"
        );
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        debug!(session_id = %id, "Deleting session from cache");
        Ok(self.cache.remove(&self.cache_key(id)).await?.is_some())
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        let expiry = self
            .cache
            .expiry(&self.cache_key(id))
            .await
            .map_err(|e| self.unreadable(id, e))?;

        Ok(match expiry {
            None => false,
            Some(expiry) if expiry <= 0 => true,
            Some(expiry) => expiry > now_millis(),
        })
    }

    async fn scan_candidates(&self, candidates: &HashSet<String>, time: i64) -> HashSet<String> {
        let mut expired = HashSet::new();

        for candidate in candidates {
            trace!(session_id = %candidate, "Checking expiry for candidate");

            match self.load(candidate).await {
                Ok(None) => {
                    debug!(session_id = %candidate, "Session no longer in cache");
                    expired.insert(candidate.clone());
                }
                Ok(Some(entity)) => {
                    let managed_here =
                        entity.last_node.as_deref() == Some(self.context.worker_name());
                    if managed_here && entity.is_expired_at(time) {
                        debug!(
                            session_id = %candidate,
                            worker = self.context.worker_name(),
                            "Managed session is expired"
                        );
                        expired.insert(candidate.clone());
                    }
                }
                Err(e) => {
                    warn!(session_id = %candidate, error = %e, "Error checking if candidate is expired");
                }
            }
        }

        expired
    }

    async fn scan_all_for_context(&self, time: i64) -> Result<HashSet<String>> {
        let Some(manager) = self.query.manager() else {
            return Ok(HashSet::new());
        };

        let expired = manager.query_expired_sessions(&self.context, time).await?;
        for id in &expired {
            debug!(worker = self.context.worker_name(), session_id = %id, "Found expired session");
        }
        Ok(expired)
    }

    async fn clean_orphans(&self, time_limit: i64) -> Result<usize> {
        match self.query.manager() {
            Some(manager) => manager.delete_orphan_sessions(time_limit).await,
            None => {
                debug!("Unable to clean orphans, no query capability");
                Ok(0)
            }
        }
    }

    fn new_entity(
        &self,
        id: &str,
        created: i64,
        accessed: i64,
        last_accessed: i64,
        max_inactive_ms: i64,
    ) -> SessionEntity {
        SessionEntity::new(
            id,
            self.context.context_path(),
            self.context.virtual_host(),
            created,
            accessed,
            last_accessed,
            max_inactive_ms,
        )
    }

    fn is_passivating(&self) -> bool {
        self.passivating
    }
}

impl fmt::Display for ClusteredSessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ClusteredSessionStore[context={},cache={},idleTimeoutSec={}]",
            self.context,
            self.cache.name(),
            self.config.idle_timeout_secs
        )
    }
}
