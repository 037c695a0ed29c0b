//! Configuration file watcher for hot reload.
//!
//! Only the request policy (admin ids, trusted origins, exempt paths) is
//! swapped on reload. Keys and secrets stay as loaded at startup.

use std::path::{Path, PathBuf};
use std::time::Duration;
use notify::{Watcher, RecursiveMode, Event, RecommendedWatcher, Config};
use tokio::sync::{broadcast, mpsc};
use crate::config::loader::load_config;
use crate::config::schema::PerimeterConfig;
use crate::security::policy::{PolicyHandle, SecurityPolicy};

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<PerimeterConfig>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<PerimeterConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (Self {
            path: path.to_path_buf(),
            update_tx,
        }, update_rx)
    }

    /// Start watching the file in a background thread.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!("Config file change detected, reloading...");
                        match load_config(&path) {
                            Ok(new_config) => {
                                let _ = tx.send(new_config);
                            }
                            Err(e) => {
                                tracing::error!("Failed to reload config: {}. Keeping current configuration.", e);
                            }
                        }
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            }
        }, Config::default().with_poll_interval(Duration::from_secs(2)))?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

/// Apply reloaded configs to the live policy until shutdown.
pub async fn apply_policy_updates(
    policy: PolicyHandle,
    mut updates: mpsc::UnboundedReceiver<PerimeterConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(config) = update else { break };
                match SecurityPolicy::from_config(&config) {
                    Ok(next) => {
                        policy.store(next);
                        tracing::info!(
                            admins = config.admin.user_ids.len(),
                            "Security policy reloaded"
                        );
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Rejected reloaded policy, keeping current");
                    }
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_policy_updates_are_applied() {
        let config = PerimeterConfig::default();
        let handle = PolicyHandle::new(SecurityPolicy::from_config(&config).unwrap());
        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let task = tokio::spawn(apply_policy_updates(handle.clone(), rx, shutdown_rx));

        let mut next = config.clone();
        next.admin.user_ids = vec!["new-admin".into()];
        tx.send(next).unwrap();

        for _ in 0..50 {
            if handle.load().is_admin("new-admin") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(handle.load().is_admin("new-admin"));

        let _ = shutdown_tx.send(());
        task.await.unwrap();
    }
}
