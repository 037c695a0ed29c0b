//! Hot-swappable request policy.
//!
//! Everything the middleware needs to classify a request, rebuilt from
//! config on reload and published through `arc-swap` so readers never lock.

use std::collections::HashSet;
use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::http::Method;

use crate::config::PerimeterConfig;
use crate::security::origin::OriginPolicy;

#[derive(Debug, Clone)]
pub struct SecurityPolicy {
    pub origin: OriginPolicy,
    admin_user_ids: HashSet<String>,
    admin_path_prefixes: Vec<String>,
    protected_prefix: String,
    exempt_prefixes: Vec<String>,
    webhook_paths: Vec<String>,
}

impl SecurityPolicy {
    pub fn from_config(config: &PerimeterConfig) -> crate::Result<Self> {
        let origin = OriginPolicy::new(
            &config.app.url,
            config.app.production,
            &config.csrf.development_origins,
            &config.csrf.trusted_preview_suffixes,
        )?;

        Ok(Self {
            origin,
            admin_user_ids: config
                .admin
                .user_ids
                .iter()
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .collect(),
            admin_path_prefixes: config.admin.path_prefixes.clone(),
            protected_prefix: config.csrf.protected_prefix.clone(),
            exempt_prefixes: config.csrf.exempt_prefixes.clone(),
            webhook_paths: config.csrf.webhook_paths.clone(),
        })
    }

    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admin_user_ids.contains(user_id)
    }

    pub fn is_admin_path(&self, path: &str) -> bool {
        self.admin_path_prefixes
            .iter()
            .any(|prefix| segment_prefix(path, prefix))
    }

    pub fn is_webhook_path(&self, path: &str) -> bool {
        self.webhook_paths.iter().any(|p| path.starts_with(p.as_str()))
    }

    /// Mutating request on a protected API path that is neither an auth
    /// route nor a webhook route.
    pub fn requires_csrf(&self, method: &Method, path: &str) -> bool {
        if is_safe_method(method) {
            return false;
        }
        if !path.starts_with(self.protected_prefix.as_str()) {
            return false;
        }
        if self.exempt_prefixes.iter().any(|p| path.starts_with(p.as_str())) {
            return false;
        }
        !self.is_webhook_path(path)
    }
}

/// GET, HEAD and OPTIONS never mutate state.
pub fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

fn segment_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return false;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Shared, lock-free handle to the live policy.
#[derive(Clone)]
pub struct PolicyHandle(Arc<ArcSwap<SecurityPolicy>>);

impl PolicyHandle {
    pub fn new(policy: SecurityPolicy) -> Self {
        Self(Arc::new(ArcSwap::from_pointee(policy)))
    }

    pub fn load(&self) -> Arc<SecurityPolicy> {
        self.0.load_full()
    }

    pub fn store(&self, policy: SecurityPolicy) {
        self.0.store(Arc::new(policy));
    }
}
