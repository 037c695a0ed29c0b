//! Nonce stores for webhook replay protection.
//!
//! A claim must be a single atomic conditional write: two concurrent claims
//! of the same key must never both succeed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use url::Url;

use crate::error::StoreError;

#[async_trait]
pub trait NonceStore: Send + Sync {
    /// Claim `key` for `ttl`. `Ok(true)` if this call claimed it, `Ok(false)`
    /// if a live claim already exists. An existing claim's TTL is never
    /// extended.
    async fn claim(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;
}

/// Process-local nonce store.
///
/// Claims live only in this process. Two instances behind a load balancer
/// would each accept the same delivery once, so this backend is only safe
/// for single-instance deployments and tests. Use [`RestNonceStore`] when
/// running more than one instance.
#[derive(Debug, Default)]
pub struct MemoryNonceStore {
    claims: DashMap<String, Instant>,
}

impl MemoryNonceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    /// Evict expired claims. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.claims.len();
        self.claims.retain(|_, expires_at| *expires_at > now);
        before.saturating_sub(self.claims.len())
    }

    /// Sweep on an interval until shutdown.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        every: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let evicted = self.sweep();
                        if evicted > 0 {
                            tracing::debug!(evicted, remaining = self.len(), "Swept expired webhook nonces");
                        }
                    }
                    _ = shutdown.recv() => break,
                }
            }
        })
    }
}

#[async_trait]
impl NonceStore for MemoryNonceStore {
    async fn claim(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let now = Instant::now();
        match self.claims.entry(key.to_string()) {
            Entry::Occupied(mut existing) => {
                if *existing.get() <= now {
                    existing.insert(now + ttl);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(now + ttl);
                Ok(true)
            }
        }
    }
}

/// Shared nonce store speaking the Redis-over-HTTP protocol
/// (`POST {base}/set/{key}/1/NX/EX/{ttl}`).
#[derive(Debug, Clone)]
pub struct RestNonceStore {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RestReply {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

impl RestNonceStore {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self, StoreError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| StoreError::InvalidPath(format!("nonce store url: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::InvalidPath("nonce store url cannot be a base".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    fn set_nx_url(&self, key: &str, ttl: Duration) -> Result<Url, StoreError> {
        let ttl = ttl.as_secs().max(1).to_string();
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::InvalidPath("nonce store url cannot be a base".into()))?
            .pop_if_empty()
            .extend(["set", key, "1", "NX", "EX", ttl.as_str()]);
        Ok(url)
    }
}

#[async_trait]
impl NonceStore for RestNonceStore {
    async fn claim(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let url = self.set_nx_url(key, ttl)?;
        let mut request = self.client.post(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Unavailable(format!("nonce store returned {status}")));
        }

        let reply: RestReply = response
            .json()
            .await
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        if let Some(error) = reply.error {
            return Err(StoreError::Unavailable(error));
        }
        match reply.result {
            Some(Value::String(ok)) if ok == "OK" => Ok(true),
            None | Some(Value::Null) => Ok(false),
            Some(other) => Err(StoreError::Serialization(format!(
                "unexpected nonce store reply: {other}"
            ))),
        }
    }
}
