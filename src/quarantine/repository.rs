//! Quarantine record persistence.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::StoreError;
use crate::quarantine::types::{QuarantineStatus, QuarantinedFile};

/// Terminal state to move a pending record into.
#[derive(Debug, Clone)]
pub struct ReviewOutcome {
    pub status: QuarantineStatus,
    pub reviewed_by: Option<String>,
    pub review_notes: Option<String>,
    pub reviewed_at: DateTime<Utc>,
    /// Drop the blob url along with the transition.
    pub clear_url: bool,
}

#[async_trait]
pub trait QuarantineRepository: Send + Sync {
    async fn insert(&self, record: QuarantinedFile) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<QuarantinedFile>, StoreError>;

    /// Records newest first, optionally filtered, plus the filtered total.
    async fn list(
        &self,
        status: Option<QuarantineStatus>,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<QuarantinedFile>, u64), StoreError>;

    /// Apply `outcome` only if the record is still PENDING. Returns the
    /// record as it was before the transition, or `None` if it does not
    /// exist or already left PENDING. Must be atomic per record.
    async fn transition_from_pending(
        &self,
        id: Uuid,
        outcome: ReviewOutcome,
    ) -> Result<Option<QuarantinedFile>, StoreError>;

    async fn count_by_status(&self, status: QuarantineStatus) -> Result<u64, StoreError>;

    async fn count(&self) -> Result<u64, StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryQuarantineRepository {
    records: DashMap<Uuid, QuarantinedFile>,
    unavailable: AtomicBool,
}

impl MemoryQuarantineRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("quarantine store offline".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl QuarantineRepository for MemoryQuarantineRepository {
    async fn insert(&self, record: QuarantinedFile) -> Result<(), StoreError> {
        self.check()?;
        self.records.insert(record.id, record);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<QuarantinedFile>, StoreError> {
        self.check()?;
        Ok(self.records.get(&id).map(|r| r.value().clone()))
    }

    async fn list(
        &self,
        status: Option<QuarantineStatus>,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<QuarantinedFile>, u64), StoreError> {
        self.check()?;
        let mut matching: Vec<QuarantinedFile> = self
            .records
            .iter()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .map(|r| r.value().clone())
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        let total = matching.len() as u64;
        let items = matching.into_iter().skip(offset).take(limit).collect();
        Ok((items, total))
    }

    async fn transition_from_pending(
        &self,
        id: Uuid,
        outcome: ReviewOutcome,
    ) -> Result<Option<QuarantinedFile>, StoreError> {
        self.check()?;
        // The shard write lock is held for the whole check-and-set.
        let Some(mut record) = self.records.get_mut(&id) else {
            return Ok(None);
        };
        if record.status.is_terminal() {
            return Ok(None);
        }
        let before = record.clone();
        record.status = outcome.status;
        record.reviewed_by = outcome.reviewed_by;
        record.review_notes = outcome.review_notes;
        record.reviewed_at = Some(outcome.reviewed_at);
        if outcome.clear_url {
            record.url = None;
        }
        Ok(Some(before))
    }

    async fn count_by_status(&self, status: QuarantineStatus) -> Result<u64, StoreError> {
        self.check()?;
        Ok(self.records.iter().filter(|r| r.status == status).count() as u64)
    }

    async fn count(&self) -> Result<u64, StoreError> {
        self.check()?;
        Ok(self.records.len() as u64)
    }
}
