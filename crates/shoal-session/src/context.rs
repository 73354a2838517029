//! The deployment scope a store serves.

use std::fmt;

/// Virtual host used when a deployment does not name one.
pub const DEFAULT_VIRTUAL_HOST: &str = "0.0.0.0";

/// Identifies the deployment (context path + virtual host) a store persists
/// sessions for, and the worker node the store runs on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    context_path: String,
    virtual_host: String,
    worker_name: String,
}

impl SessionContext {
    /// Create a context with a canonical path and host.
    pub fn new(
        context_path: &str,
        virtual_host: Option<&str>,
        worker_name: impl Into<String>,
    ) -> Self {
        Self {
            context_path: canonical_context_path(context_path),
            virtual_host: canonical_virtual_host(virtual_host),
            worker_name: worker_name.into(),
        }
    }

    /// Create a context for this process with a generated worker name.
    pub fn with_generated_worker(context_path: &str, virtual_host: Option<&str>) -> Self {
        Self::new(context_path, virtual_host, generate_worker_name())
    }

    /// Canonical context path (root context is the empty string).
    pub fn context_path(&self) -> &str {
        &self.context_path
    }

    pub fn virtual_host(&self) -> &str {
        &self.virtual_host
    }

    /// Name of the node this store runs on; written to `last_node`.
    pub fn worker_name(&self) -> &str {
        &self.worker_name
    }
}

impl fmt::Display for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.context_path.is_empty() {
            "/"
        } else {
            &self.context_path
        };
        write!(f, "{}@{}", path, self.virtual_host)
    }
}

/// Root (`/` or empty) maps to the empty string; trailing slashes are
/// dropped and a leading slash is ensured.
pub fn canonical_context_path(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

pub fn canonical_virtual_host(host: Option<&str>) -> String {
    match host.map(str::trim) {
        Some(h) if !h.is_empty() => h.to_string(),
        _ => DEFAULT_VIRTUAL_HOST.to_string(),
    }
}

/// `node-<uuid>` worker name for nodes that are not configured with one.
pub fn generate_worker_name() -> String {
    format!("node-{}", uuid::Uuid::new_v4().simple())
}
