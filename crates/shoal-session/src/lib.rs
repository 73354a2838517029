//! Clustered session persistence over a shared distributed cache.
//!
//! Stateless nodes share session records through one backing cache. Each
//! node decides on its own which sessions it may expire (the ones it wrote
//! last) and, when the cache can be queried, sweeps up sessions left behind
//! by nodes that have gone away.
//!
//! This crate provides:
//! - A collision-free cache key codec
//! - The session entity with live or passivated attributes
//! - The [`SessionDataStore`] contract and its shared-cache implementation
//! - An optional query capability for context-wide and orphan sweeps
//! - An embedded in-process cache with idle timeouts
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use shoal_session::{ClusteredSessionStore, MemoryCache, QueryCapability, SessionContext, StoreConfig};
//!
//! let cache = Arc::new(MemoryCache::new("sessions"));
//! let store = ClusteredSessionStore::builder(SessionContext::new("/app", Some("www"), "node-a"))
//!     .cache(cache.clone())
//!     .query(QueryCapability::embedded(cache))
//!     .config(StoreConfig::new().with_idle_timeout_secs(1800))
//!     .start()?;
//! ```

mod backend;
mod config;
mod context;
mod entity;
mod error;
pub mod key;
mod memory;
mod passivation;
mod query;
mod store;

pub use backend::{CacheKind, CacheResult, QueryableCache, SessionCache, SessionRow};
pub use config::{DEFAULT_GRACE_PERIOD, StoreConfig};
pub use context::{DEFAULT_VIRTUAL_HOST, SessionContext, generate_worker_name};
pub use entity::{Attributes, SessionEntity};
pub use error::{CacheError, Error, Result};
pub use memory::MemoryCache;
pub use query::{CacheQueryManager, QueryCapability, QueryManager};
pub use store::{ClusteredSessionStore, SessionDataStore, StoreBuilder};

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
