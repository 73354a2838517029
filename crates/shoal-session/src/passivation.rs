//! Decides once, at start-up, whether loaded sessions arrive passivated.

use tracing::{debug, info};

use crate::backend::{CacheKind, SessionCache};

/// Classify the cache. An explicit `configured` flag wins over the cache's
/// own descriptor; an unknown kind is treated as embedded.
pub fn detect(cache: &dyn SessionCache, configured: Option<bool>) -> bool {
    if let Some(passivating) = configured {
        debug!(cache = cache.name(), passivating, "Passivation mode set by configuration");
        return passivating;
    }

    match cache.kind() {
        CacheKind::Remote => true,
        CacheKind::Embedded => false,
        CacheKind::Unknown => {
            info!(
                cache = cache.name(),
                "Cache kind not declared, assuming embedded mode"
            );
            false
        }
    }
}
