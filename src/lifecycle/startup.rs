//! Startup orchestration.
//!
//! # Responsibilities
//! - Construct collaborator stores from configuration
//! - Start store-side background tasks (nonce sweeper)
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Record stores are in-process; relational backends plug in through the
//!   same traits
//! - The memory nonce store is for single-instance deployments only

use std::sync::Arc;
use std::time::Duration;

use crate::audit::MemoryAuditStore;
use crate::config::{NonceBackend, PerimeterConfig};
use crate::error::{Error, Result};
use crate::http::Collaborators;
use crate::lifecycle::Shutdown;
use crate::quarantine::{FsBlobStore, MemoryQuarantineRepository};
use crate::webhook::{MemoryNonceStore, NonceStore, RestNonceStore};

/// Build the nonce store for the configured backend.
pub fn build_nonce_store(config: &PerimeterConfig, shutdown: &Shutdown) -> Result<Arc<dyn NonceStore>> {
    let settings = &config.webhook.nonce_store;
    match settings.backend {
        NonceBackend::Memory => {
            tracing::warn!(
                "Using in-process nonce store; replay protection is per instance only"
            );
            let store = Arc::new(MemoryNonceStore::new());
            store.clone().spawn_sweeper(
                Duration::from_secs(settings.sweep_interval_secs.max(1)),
                shutdown.subscribe(),
            );
            Ok(store)
        }
        NonceBackend::Rest => {
            let url = settings
                .url
                .as_deref()
                .ok_or_else(|| Error::Config("webhook.nonce_store.url is required".into()))?;
            let store = RestNonceStore::new(
                url,
                settings.token.clone(),
                Duration::from_millis(settings.request_timeout_ms),
            )?;
            tracing::info!("Using shared REST nonce store");
            Ok(Arc::new(store))
        }
    }
}

pub fn build_collaborators(config: &PerimeterConfig, shutdown: &Shutdown) -> Result<Collaborators> {
    let blob_store = FsBlobStore::new(&config.quarantine.blob_root)?;
    tracing::info!(root = %blob_store.root().display(), "Blob store ready");

    Ok(Collaborators {
        audit_store: Arc::new(MemoryAuditStore::new()),
        quarantine_repo: Arc::new(MemoryQuarantineRepository::new()),
        blob_store: Arc::new(blob_store),
        nonce_store: build_nonce_store(config, shutdown)?,
    })
}
