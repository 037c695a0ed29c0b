//! Fire-and-forget audit logger.
//!
//! Callers hand events to [`AuditLogger::log`], which sanitizes them and
//! enqueues the result on a bounded channel. A drain worker persists entries
//! in the background. Nothing on the caller's path awaits the store, and no
//! store failure ever reaches the caller.

use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::audit::entry::{AuditEvent, AuditLogEntry};
use crate::audit::sanitize::{truncate_user_agent, IpHasher, Redactor};
use crate::audit::store::AuditStore;
use crate::config::AuditConfig;
use crate::observability::metrics;

struct Inner {
    tx: mpsc::Sender<AuditLogEntry>,
    store: Arc<dyn AuditStore>,
    redactor: Redactor,
    ip_hasher: IpHasher,
    user_agent_max_len: usize,
}

/// Cheap, cloneable handle to the audit pipeline.
#[derive(Clone)]
pub struct AuditLogger {
    inner: Arc<Inner>,
}

impl AuditLogger {
    /// Start the drain worker and return a handle to it.
    ///
    /// The worker runs until [`AuditWorker::stop`] is called or every handle
    /// has been dropped. It is not tied to the process shutdown signal, so
    /// requests still in flight while the server drains keep their entries.
    pub fn spawn(
        store: Arc<dyn AuditStore>,
        config: &AuditConfig,
    ) -> crate::Result<(Self, AuditWorker)> {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let inner = Inner {
            tx,
            store: store.clone(),
            redactor: Redactor::new(&config.redact_keys),
            ip_hasher: IpHasher::new(&config.ip_hash_secret, config.ip_hash_len)?,
            user_agent_max_len: config.user_agent_max_len,
        };

        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(drain(rx, store, stop_rx));
        let worker = AuditWorker {
            stop: stop_tx,
            handle,
        };
        Ok((Self { inner: Arc::new(inner) }, worker))
    }

    /// Record a security event. Never blocks and never fails.
    pub fn log(&self, event: AuditEvent) {
        let entry = self.sanitize(event);
        let action = entry.action;
        metrics::record_audit_event(action.as_str());

        if let Err(e) = self.inner.tx.try_send(entry) {
            metrics::record_audit_dropped();
            match e {
                mpsc::error::TrySendError::Full(_) => {
                    tracing::warn!(action = action.as_str(), "Audit queue full, event dropped");
                }
                mpsc::error::TrySendError::Closed(_) => {
                    tracing::warn!(action = action.as_str(), "Audit worker stopped, event dropped");
                }
            }
        }
    }

    /// Turn a raw event into its storable form.
    pub fn sanitize(&self, event: AuditEvent) -> AuditLogEntry {
        AuditLogEntry {
            id: Uuid::new_v4(),
            user_id: event.user_id,
            action: event.action,
            entity_type: event.entity_type,
            entity_id: event.entity_id,
            metadata: self.inner.redactor.sanitize(&event.metadata),
            ip_address: event
                .client
                .ip_address
                .as_deref()
                .filter(|ip| !ip.is_empty())
                .map(|ip| self.inner.ip_hasher.hash(ip)),
            user_agent: event
                .client
                .user_agent
                .as_deref()
                .map(|ua| truncate_user_agent(ua, self.inner.user_agent_max_len)),
            created_at: Utc::now(),
        }
    }

    /// Delete entries older than `retention_days`. Returns 0 on failure.
    pub async fn cleanup(&self, retention_days: u32) -> u64 {
        let Some(cutoff) = TimeDelta::try_days(i64::from(retention_days))
            .and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            tracing::error!(retention_days, "Audit retention window out of range, sweep skipped");
            return 0;
        };
        match self.inner.store.delete_before(cutoff).await {
            Ok(deleted) => {
                tracing::info!(deleted, retention_days, "Audit retention sweep complete");
                deleted
            }
            Err(e) => {
                tracing::error!(error = %e, "Audit retention sweep failed");
                0
            }
        }
    }

    /// Most recent persisted entries, newest first.
    pub async fn recent(&self, limit: usize) -> crate::Result<Vec<AuditLogEntry>> {
        Ok(self.inner.store.recent(limit).await?)
    }
}

/// Owner side of the drain task.
pub struct AuditWorker {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl AuditWorker {
    /// Close the queue, persist what is left and wait for the task to end.
    ///
    /// Call once nothing else can log, e.g. after the server has finished
    /// its in-flight requests. Events logged afterwards are dropped.
    pub async fn stop(self) {
        let _ = self.stop.send(());
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "Audit worker ended abnormally");
        }
    }

    pub fn abort(&self) {
        self.handle.abort();
    }
}

async fn drain(
    mut rx: mpsc::Receiver<AuditLogEntry>,
    store: Arc<dyn AuditStore>,
    mut stop: oneshot::Receiver<()>,
) {
    // A dropped `AuditWorker` leaves the task running until the handles go.
    let mut stoppable = true;
    loop {
        tokio::select! {
            next = rx.recv() => match next {
                Some(entry) => persist(store.as_ref(), entry).await,
                None => break,
            },
            signal = &mut stop, if stoppable => {
                if signal.is_err() {
                    stoppable = false;
                    continue;
                }
                rx.close();
                while let Some(entry) = rx.recv().await {
                    persist(store.as_ref(), entry).await;
                }
                break;
            }
        }
    }
    tracing::debug!("Audit drain worker stopped");
}

async fn persist(store: &dyn AuditStore, entry: AuditLogEntry) {
    let action = entry.action.as_str();
    if let Err(e) = store.insert(entry).await {
        tracing::warn!(error = %e, action, "Audit write failed");
    }
}
