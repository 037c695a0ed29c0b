//! Scheduled audit retention sweep.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::audit::AuditLogger;

/// Run `cleanup(retention_days)` every `every` until shutdown. The first
/// sweep happens one interval after start.
pub fn spawn_retention_job(
    audit: AuditLogger,
    retention_days: u32,
    every: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    audit.cleanup(retention_days).await;
                }
                _ = shutdown.recv() => break,
            }
        }
        tracing::debug!("Audit retention job stopped");
    })
}
