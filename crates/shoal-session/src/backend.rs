//! Contracts consumed from the backing cache.
//!
//! [`SessionCache`] is the plain key-value contract every backend provides.
//! [`QueryableCache`] is the optional structured lookup some backends add
//! on top. Implementations are injected into the store as shared handles and
//! keep their own lifecycle, timeouts and retry policy.

use std::time::Duration;

use async_trait::async_trait;

use crate::entity::SessionEntity;
use crate::error::CacheError;

/// Result type for backing cache calls.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// How a cache holds values, declared by the cache itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    /// In-process; holds live entities.
    Embedded,
    /// Network-attached; entities cross the wire in serialized form.
    Remote,
    /// The client cannot tell.
    Unknown,
}

/// Key-value contract of a backing cache.
///
/// All implementations must be `Send + Sync`; one handle is shared by every
/// worker on a node.
#[async_trait]
pub trait SessionCache: Send + Sync {
    /// Name of the cache, for diagnostics.
    fn name(&self) -> &str;

    fn kind(&self) -> CacheKind;

    /// Fetch a record. `Ok(None)` if the key is absent.
    async fn get(&self, key: &str) -> CacheResult<Option<SessionEntity>>;

    /// Write a record. With `idle_timeout`, the cache evicts the record once
    /// it has gone unaccessed for that long.
    async fn put(
        &self,
        key: &str,
        entity: SessionEntity,
        idle_timeout: Option<Duration>,
    ) -> CacheResult<()>;

    /// Remove a record, returning the previous value if there was one.
    async fn remove(&self, key: &str) -> CacheResult<Option<SessionEntity>>;

    /// Expiry of a record without materializing its attributes.
    ///
    /// The default fetches the whole record; backends that can project a
    /// single field should override it.
    async fn expiry(&self, key: &str) -> CacheResult<Option<i64>> {
        Ok(self.get(key).await?.map(|entity| entity.expiry))
    }
}

/// One row of a query result: the columns needed to rebuild a cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRow {
    pub id: String,
    pub context_path: String,
    pub virtual_host: String,
    pub expiry: i64,
}

/// Structured lookup over stored records.
#[async_trait]
pub trait QueryableCache: SessionCache {
    /// All records with `expiry <= expiry_upper_bound`, restricted to one
    /// context path when `context_filter` is given.
    async fn query(
        &self,
        context_filter: Option<&str>,
        expiry_upper_bound: i64,
    ) -> CacheResult<Vec<SessionRow>>;
}
