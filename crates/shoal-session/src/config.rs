//! Configuration for the clustered session store.

use std::time::Duration;

/// Default grace period between context-wide expiry scans (one hour).
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(3600);

/// Configuration for a [`ClusteredSessionStore`](crate::ClusteredSessionStore).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Cache-level idle timeout in seconds applied to mortal sessions.
    /// `0` disables it, leaving expiry entirely to explicit scavenging.
    pub idle_timeout_secs: u64,

    /// Force passivation on or off instead of asking the cache.
    pub passivating: Option<bool>,

    /// How far behind "now" context-wide scans look, and how often they run.
    /// Orphan sweeps use ten times this.
    pub grace_period: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 0,
            passivating: None,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }
}

impl StoreConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cache-level idle timeout.
    pub fn with_idle_timeout_secs(mut self, secs: u64) -> Self {
        self.idle_timeout_secs = secs;
        self
    }

    /// Set the passivation mode explicitly.
    pub fn with_passivating(mut self, passivating: bool) -> Self {
        self.passivating = Some(passivating);
        self
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Idle timeout to hand to the cache, if one is configured.
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }
}
