//! Error types for clustered session store operations.

use std::time::Duration;

/// Error raised by a backing cache client.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The cache could not be reached or rejected the operation.
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    /// The cache client gave up waiting for a reply.
    #[error("cache operation timed out after {0:?}")]
    Timeout(Duration),

    /// A record could not be encoded for, or decoded from, the cache.
    #[error("cache codec error: {0}")]
    Codec(String),
}

/// Error type for session store operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A session could not be loaded: the cache failed or the stored
    /// payload could not be deserialized.
    #[error("unreadable session {id} in context {context}: {source}")]
    Unreadable {
        id: String,
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A write or removal against the cache failed.
    #[error("persistence error: {0}")]
    Persistence(#[from] CacheError),

    /// The store was started without a required collaborator.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Attributes were accessed while still in serialized form.
    #[error("attributes of session {0} have not been deserialized")]
    Passivated(String),

    /// Attribute or entity (de)serialization failed.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// A cache key did not have the expected shape.
    #[error("invalid cache key: {0}")]
    InvalidKey(String),
}

/// Result type for session store operations.
pub type Result<T> = std::result::Result<T, Error>;
