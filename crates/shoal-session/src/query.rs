//! Optional query capability for bulk expiry and orphan sweeps.
//!
//! A plain key-value cache cannot answer "which sessions are due" without
//! an index. Backends that can are wrapped in a [`QueryManager`]; stores
//! without one fall back to the degraded behaviour described on
//! [`QueryCapability::None`].

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::backend::QueryableCache;
use crate::context::SessionContext;
use crate::error::Result;
use crate::key;

/// Structured expiry lookups over the whole cluster's records.
#[async_trait]
pub trait QueryManager: Send + Sync {
    /// Ids in `context` with `0 < expiry <= time`, whichever node wrote them.
    /// Both the context path and the virtual host must match.
    async fn query_expired_sessions(
        &self,
        context: &SessionContext,
        time: i64,
    ) -> Result<HashSet<String>>;

    /// Remove every record in every context and host with
    /// `0 < expiry <= time`. A record that fails to delete is logged and
    /// skipped. Returns how many records were removed.
    async fn delete_orphan_sessions(&self, time: i64) -> Result<usize>;
}

/// [`QueryManager`] over any cache implementing the query contract.
pub struct CacheQueryManager<C: ?Sized> {
    cache: Arc<C>,
}

impl<C: QueryableCache + ?Sized> CacheQueryManager<C> {
    pub fn new(cache: Arc<C>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl<C: QueryableCache + ?Sized> QueryManager for CacheQueryManager<C> {
    async fn query_expired_sessions(
        &self,
        context: &SessionContext,
        time: i64,
    ) -> Result<HashSet<String>> {
        let rows = self.cache.query(Some(context.context_path()), time).await?;
        Ok(rows
            .into_iter()
            .filter(|row| row.virtual_host == context.virtual_host())
            .filter(|row| row.expiry > 0 && row.expiry <= time)
            .map(|row| row.id)
            .collect())
    }

    async fn delete_orphan_sessions(&self, time: i64) -> Result<usize> {
        let rows = self.cache.query(None, time).await?;
        let mut removed = 0;

        for row in rows.iter().filter(|row| row.expiry > 0 && row.expiry <= time) {
            let key = key::encode(&row.context_path, &row.virtual_host, &row.id);
            match self.cache.remove(&key).await {
                Ok(Some(_)) => removed += 1,
                Ok(None) => {}
                Err(e) => warn!(key = %key, error = %e, "Error deleting orphan session"),
            }
        }

        debug!(time, removed, "Orphan sweep finished");
        Ok(removed)
    }
}

/// Query capability selected when a store is configured.
#[derive(Clone, Default)]
pub enum QueryCapability {
    /// No query backend. Context-wide scans return nothing and orphan
    /// sweeps do nothing.
    #[default]
    None,
    /// Query runs in-process against an embedded cache.
    Embedded(Arc<dyn QueryManager>),
    /// Query is shipped to a networked cache.
    Networked(Arc<dyn QueryManager>),
}

impl QueryCapability {
    /// Embedded capability over an in-process queryable cache.
    pub fn embedded<C: QueryableCache + 'static>(cache: Arc<C>) -> Self {
        QueryCapability::Embedded(Arc::new(CacheQueryManager::new(cache)))
    }

    /// Networked capability over a remote queryable cache.
    pub fn networked<C: QueryableCache + 'static>(cache: Arc<C>) -> Self {
        QueryCapability::Networked(Arc::new(CacheQueryManager::new(cache)))
    }

    pub fn manager(&self) -> Option<&Arc<dyn QueryManager>> {
        match self {
            QueryCapability::None => None,
            QueryCapability::Embedded(manager) | QueryCapability::Networked(manager) => {
                Some(manager)
            }
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, QueryCapability::None)
    }
}

impl fmt::Debug for QueryCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QueryCapability::None => "None",
            QueryCapability::Embedded(_) => "Embedded",
            QueryCapability::Networked(_) => "Networked",
        })
    }
}
