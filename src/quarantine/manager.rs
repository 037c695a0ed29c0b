//! Quarantine lifecycle.
//!
//! ```text
//! PENDING ──approve──▶ APPROVED
//!    │────reject───▶ REJECTED   (blob deleted, url cleared)
//!    └──auto-clean─▶ AUTO_CLEAN
//! ```
//!
//! The blob is written before the record, and a record is written even if
//! the blob write failed. A blob without a record is never left behind.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::audit::{AuditAction, AuditEvent, AuditLogger, ClientInfo};
use crate::error::Result;
use crate::observability::metrics;
use crate::quarantine::blob::{BlobAccess, BlobStore, PutOptions};
use crate::quarantine::repository::{QuarantineRepository, ReviewOutcome};
use crate::quarantine::types::{
    sanitize_filename, stored_name, Page, QuarantineStats, QuarantineStatus, QuarantinedFile,
    ReasonCode,
};

pub const MAX_PAGE_SIZE: u32 = 100;

/// An untrusted upload to isolate.
#[derive(Debug, Clone, Copy)]
pub struct Submission<'a> {
    pub bytes: &'a [u8],
    pub filename: &'a str,
    pub mime_type: &'a str,
    pub user_id: &'a str,
    pub reason: &'a str,
    pub reason_code: ReasonCode,
}

#[derive(Clone)]
pub struct QuarantineManager {
    repo: Arc<dyn QuarantineRepository>,
    blobs: Arc<dyn BlobStore>,
    audit: AuditLogger,
    namespace: String,
}

impl QuarantineManager {
    pub fn new(
        repo: Arc<dyn QuarantineRepository>,
        blobs: Arc<dyn BlobStore>,
        audit: AuditLogger,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            repo,
            blobs,
            audit,
            namespace: namespace.into(),
        }
    }

    pub async fn quarantine(
        &self,
        submission: Submission<'_>,
        client: &ClientInfo,
    ) -> Result<QuarantinedFile> {
        let filename = sanitize_filename(submission.filename);
        let stored_name = stored_name(&filename);
        let path = format!("{}/{}", self.namespace, stored_name);

        let url = match self
            .blobs
            .put(
                &path,
                submission.bytes,
                PutOptions {
                    access: BlobAccess::Private,
                    content_type: submission.mime_type.to_string(),
                },
            )
            .await
        {
            Ok(blob) => Some(blob.url),
            Err(e) => {
                tracing::warn!(error = %e, stored_name = %stored_name, "Quarantine blob write failed, keeping record only");
                None
            }
        };

        let record = QuarantinedFile {
            id: Uuid::new_v4(),
            filename,
            stored_name,
            url,
            mime_type: submission.mime_type.to_string(),
            size: submission.bytes.len() as u64,
            user_id: submission.user_id.to_string(),
            reason: submission.reason.to_string(),
            reason_code: submission.reason_code,
            status: QuarantineStatus::Pending,
            reviewed_by: None,
            review_notes: None,
            created_at: Utc::now(),
            reviewed_at: None,
        };

        if let Err(e) = self.repo.insert(record.clone()).await {
            if let Some(url) = &record.url {
                if let Err(cleanup) = self.blobs.delete(url).await {
                    tracing::error!(error = %cleanup, id = %record.id, "Orphaned quarantine blob");
                }
            }
            return Err(e.into());
        }

        metrics::record_file_quarantined(record.reason_code.as_str());
        tracing::warn!(
            id = %record.id,
            reason_code = record.reason_code.as_str(),
            blob_stored = record.url.is_some(),
            "File quarantined"
        );
        self.audit.log(
            AuditEvent::new(AuditAction::FileQuarantined, "quarantined_file")
                .user(Some(record.user_id.clone()))
                .entity_id(record.id.to_string())
                .metadata(json!({
                    "filename": record.filename,
                    "storedName": record.stored_name,
                    "mimeType": record.mime_type,
                    "size": record.size,
                    "reason": record.reason,
                    "reasonCode": record.reason_code,
                    "blobStored": record.url.is_some(),
                }))
                .client(client),
        );

        Ok(record)
    }

    /// One page of records, newest first. `page` is 1-based.
    pub async fn list(
        &self,
        status: Option<QuarantineStatus>,
        page: u32,
        page_size: u32,
    ) -> Result<Page<QuarantinedFile>> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        let offset = (page as usize - 1) * page_size as usize;
        let (items, total) = self.repo.list(status, offset, page_size as usize).await?;
        Ok(Page {
            items,
            total,
            page,
            page_size,
        })
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<QuarantinedFile>> {
        Ok(self.repo.get(id).await?)
    }

    pub async fn stats(&self) -> Result<QuarantineStats> {
        Ok(QuarantineStats {
            pending: self.repo.count_by_status(QuarantineStatus::Pending).await?,
            approved: self.repo.count_by_status(QuarantineStatus::Approved).await?,
            rejected: self.repo.count_by_status(QuarantineStatus::Rejected).await?,
            total: self.repo.count().await?,
        })
    }

    /// `false` if the record is unknown or no longer pending.
    pub async fn approve(
        &self,
        id: Uuid,
        admin_id: &str,
        notes: Option<String>,
        client: &ClientInfo,
    ) -> Result<bool> {
        let outcome = ReviewOutcome {
            status: QuarantineStatus::Approved,
            reviewed_by: Some(admin_id.to_string()),
            review_notes: notes,
            reviewed_at: Utc::now(),
            clear_url: false,
        };
        let Some(before) = self.repo.transition_from_pending(id, outcome).await? else {
            return Ok(false);
        };

        self.record_review(&before, AuditAction::FileQuarantineApproved, Some(admin_id), client);
        Ok(true)
    }

    /// `false` if the record is unknown or no longer pending. The blob is
    /// deleted after the transition; a failed delete is only logged.
    pub async fn reject(
        &self,
        id: Uuid,
        admin_id: &str,
        notes: Option<String>,
        client: &ClientInfo,
    ) -> Result<bool> {
        let outcome = ReviewOutcome {
            status: QuarantineStatus::Rejected,
            reviewed_by: Some(admin_id.to_string()),
            review_notes: notes,
            reviewed_at: Utc::now(),
            clear_url: true,
        };
        let Some(before) = self.repo.transition_from_pending(id, outcome).await? else {
            return Ok(false);
        };

        if let Some(url) = &before.url {
            if let Err(e) = self.blobs.delete(url).await {
                tracing::warn!(error = %e, id = %id, "Rejected quarantine blob not deleted");
            }
        }

        self.record_review(&before, AuditAction::FileQuarantineRejected, Some(admin_id), client);
        Ok(true)
    }

    /// Automated rescan found the file clean.
    pub async fn mark_auto_clean(&self, id: Uuid) -> Result<bool> {
        let outcome = ReviewOutcome {
            status: QuarantineStatus::AutoClean,
            reviewed_by: None,
            review_notes: None,
            reviewed_at: Utc::now(),
            clear_url: false,
        };
        let Some(before) = self.repo.transition_from_pending(id, outcome).await? else {
            return Ok(false);
        };

        self.record_review(
            &before,
            AuditAction::FileQuarantineAutoCleaned,
            None,
            &ClientInfo::default(),
        );
        Ok(true)
    }

    fn record_review(
        &self,
        before: &QuarantinedFile,
        action: AuditAction,
        reviewer: Option<&str>,
        client: &ClientInfo,
    ) {
        let outcome = match action {
            AuditAction::FileQuarantineApproved => "approved",
            AuditAction::FileQuarantineRejected => "rejected",
            _ => "auto_clean",
        };
        metrics::record_quarantine_review(outcome);
        tracing::info!(id = %before.id, outcome, reviewer = reviewer.unwrap_or("system"), "Quarantine reviewed");

        self.audit.log(
            AuditEvent::new(action, "quarantined_file")
                .user(reviewer)
                .entity_id(before.id.to_string())
                .metadata(json!({
                    "filename": before.filename,
                    "uploadedBy": before.user_id,
                    "reasonCode": before.reason_code,
                    "previousStatus": before.status,
                }))
                .client(client),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditStore;
    use crate::config::AuditConfig;
    use crate::quarantine::blob::MemoryBlobStore;
    use crate::quarantine::repository::MemoryQuarantineRepository;

    struct Fixture {
        manager: QuarantineManager,
        repo: Arc<MemoryQuarantineRepository>,
        blobs: Arc<MemoryBlobStore>,
        audit: Arc<MemoryAuditStore>,
    }

    fn fixture() -> Fixture {
        let audit_store = Arc::new(MemoryAuditStore::new());
        let config = AuditConfig {
            ip_hash_secret: "pepper".into(),
            ..AuditConfig::default()
        };
        let (logger, _) = AuditLogger::spawn(audit_store.clone(), &config).unwrap();
        let repo = Arc::new(MemoryQuarantineRepository::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        Fixture {
            manager: QuarantineManager::new(repo.clone(), blobs.clone(), logger, "quarantine"),
            repo,
            blobs,
            audit: audit_store,
        }
    }

    fn submission<'a>(filename: &'a str) -> Submission<'a> {
        Submission {
            bytes: b"MZ\x90\x00",
            filename,
            mime_type: "application/pdf",
            user_id: "u-1",
            reason: "executable signature",
            reason_code: ReasonCode::ExecutableContent,
        }
    }

    async fn audited(store: &MemoryAuditStore, action: AuditAction, n: usize) -> usize {
        for _ in 0..100 {
            let count = store.by_action(action).await.len();
            if count >= n {
                return count;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        store.by_action(action).await.len()
    }

    #[tokio::test]
    async fn test_quarantine_sanitizes_and_stores() {
        let f = fixture();
        let record = f
            .manager
            .quarantine(submission("../../../etc/passwd"), &ClientInfo::default())
            .await
            .unwrap();

        assert_eq!(record.status, QuarantineStatus::Pending);
        assert!(!record.stored_name.contains('/'));
        assert!(!record.stored_name.split('/').any(|s| s == ".."));
        assert!(record.stored_name.ends_with(".._.._.._etc_passwd"));

        let url = record.url.clone().unwrap();
        assert!(url.contains("/quarantine/"));
        assert!(f.blobs.contains(&url));
        assert_eq!(audited(&f.audit, AuditAction::FileQuarantined, 1).await, 1);
    }

    #[tokio::test]
    async fn test_blob_failure_keeps_record() {
        let f = fixture();
        f.blobs.set_fail_puts(true);
        let record = f
            .manager
            .quarantine(submission("a.pdf"), &ClientInfo::default())
            .await
            .unwrap();

        assert_eq!(record.url, None);
        assert!(f.manager.get(record.id).await.unwrap().is_some());
        assert_eq!(audited(&f.audit, AuditAction::FileQuarantined, 1).await, 1);
    }

    #[tokio::test]
    async fn test_record_failure_removes_blob() {
        let f = fixture();
        f.repo.set_unavailable(true);
        let result = f
            .manager
            .quarantine(submission("a.pdf"), &ClientInfo::default())
            .await;
        assert!(result.is_err());
        assert!(f.blobs.is_empty());
    }

    #[tokio::test]
    async fn test_approve_once() {
        let f = fixture();
        let client = ClientInfo::default();
        let record = f.manager.quarantine(submission("a.pdf"), &client).await.unwrap();

        assert!(f.manager.approve(record.id, "admin-1", Some("ok".into()), &client).await.unwrap());
        assert!(!f.manager.approve(record.id, "admin-1", None, &client).await.unwrap());
        assert!(!f.manager.reject(record.id, "admin-2", None, &client).await.unwrap());

        let stored = f.manager.get(record.id).await.unwrap().unwrap();
        assert_eq!(stored.status, QuarantineStatus::Approved);
        assert_eq!(stored.reviewed_by.as_deref(), Some("admin-1"));
        assert_eq!(stored.review_notes.as_deref(), Some("ok"));
        assert!(stored.url.is_some());
        assert_eq!(audited(&f.audit, AuditAction::FileQuarantineApproved, 1).await, 1);
        assert_eq!(f.audit.by_action(AuditAction::FileQuarantineRejected).await.len(), 0);
    }

    #[tokio::test]
    async fn test_reject_deletes_blob() {
        let f = fixture();
        let client = ClientInfo::default();
        let record = f.manager.quarantine(submission("a.pdf"), &client).await.unwrap();
        let url = record.url.clone().unwrap();

        assert!(f.manager.reject(record.id, "admin-1", None, &client).await.unwrap());
        assert!(!f.blobs.contains(&url));
        let stored = f.manager.get(record.id).await.unwrap().unwrap();
        assert_eq!(stored.status, QuarantineStatus::Rejected);
        assert_eq!(stored.url, None);
    }

    #[tokio::test]
    async fn test_reject_survives_delete_failure() {
        let f = fixture();
        let client = ClientInfo::default();
        let record = f.manager.quarantine(submission("a.pdf"), &client).await.unwrap();
        f.blobs.set_fail_deletes(true);

        assert!(f.manager.reject(record.id, "admin-1", None, &client).await.unwrap());
        let stored = f.manager.get(record.id).await.unwrap().unwrap();
        assert_eq!(stored.status, QuarantineStatus::Rejected);
        assert_eq!(stored.url, None);
    }

    #[tokio::test]
    async fn test_unknown_id() {
        let f = fixture();
        let client = ClientInfo::default();
        assert!(!f.manager.approve(Uuid::new_v4(), "a", None, &client).await.unwrap());
        assert!(!f.manager.reject(Uuid::new_v4(), "a", None, &client).await.unwrap());
        assert!(!f.manager.mark_auto_clean(Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn test_auto_clean_and_stats() {
        let f = fixture();
        let client = ClientInfo::default();
        let a = f.manager.quarantine(submission("a.pdf"), &client).await.unwrap();
        let b = f.manager.quarantine(submission("b.pdf"), &client).await.unwrap();
        let c = f.manager.quarantine(submission("c.pdf"), &client).await.unwrap();
        f.manager.quarantine(submission("d.pdf"), &client).await.unwrap();

        assert!(f.manager.mark_auto_clean(a.id).await.unwrap());
        assert!(!f.manager.mark_auto_clean(a.id).await.unwrap());
        f.manager.approve(b.id, "admin", None, &client).await.unwrap();
        f.manager.reject(c.id, "admin", None, &client).await.unwrap();

        let stats = f.manager.stats().await.unwrap();
        assert_eq!(
            stats,
            QuarantineStats {
                pending: 1,
                approved: 1,
                rejected: 1,
                total: 4
            }
        );
        assert_eq!(audited(&f.audit, AuditAction::FileQuarantineAutoCleaned, 1).await, 1);
    }

    #[tokio::test]
    async fn test_list_paging() {
        let f = fixture();
        let client = ClientInfo::default();
        for i in 0..5 {
            f.manager
                .quarantine(submission(&format!("f{i}.pdf")), &client)
                .await
                .unwrap();
        }
        let page = f.manager.list(None, 0, 2).await.unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, 5);

        let last = f.manager.list(Some(QuarantineStatus::Pending), 3, 2).await.unwrap();
        assert_eq!(last.items.len(), 1);

        let clamped = f.manager.list(None, 1, 10_000).await.unwrap();
        assert_eq!(clamped.page_size, MAX_PAGE_SIZE);
    }
}
