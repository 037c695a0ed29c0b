//! Blob storage collaborators.
//!
//! Blob writes are best-effort from the quarantine's point of view: a failed
//! put or delete never blocks the record or its audit trail.

use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use url::Url;

use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobAccess {
    Private,
    Public,
}

#[derive(Debug, Clone)]
pub struct PutOptions {
    pub access: BlobAccess,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub url: String,
    pub pathname: String,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, path: &str, bytes: &[u8], options: PutOptions)
        -> Result<StoredBlob, StoreError>;

    async fn delete(&self, url: &str) -> Result<(), StoreError>;
}

/// Reject absolute paths and anything but plain components.
fn relative_path(path: &str) -> Result<PathBuf, StoreError> {
    let candidate = Path::new(path);
    let mut clean = PathBuf::new();
    for component in candidate.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            _ => return Err(StoreError::InvalidPath(path.to_string())),
        }
    }
    if clean.as_os_str().is_empty() {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(clean)
}

/// Blobs as files under a root directory, addressed by `file://` urls.
///
/// Files are only readable through the filesystem, so `access` has no
/// effect here.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Create (if needed) and canonicalize the root directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        std::fs::create_dir_all(root.as_ref())?;
        let root = std::fs::canonicalize(root.as_ref())?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for_url(&self, url: &str) -> Result<PathBuf, StoreError> {
        let parsed = Url::parse(url).map_err(|_| StoreError::InvalidPath(url.to_string()))?;
        if parsed.scheme() != "file" {
            return Err(StoreError::InvalidPath(url.to_string()));
        }
        let path = parsed
            .to_file_path()
            .map_err(|_| StoreError::InvalidPath(url.to_string()))?;
        let inside = path.strip_prefix(&self.root).ok().map(|rel| {
            rel.components().all(|c| matches!(c, Component::Normal(_)))
        });
        if inside != Some(true) {
            return Err(StoreError::InvalidPath(url.to_string()));
        }
        Ok(path)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(
        &self,
        path: &str,
        bytes: &[u8],
        _options: PutOptions,
    ) -> Result<StoredBlob, StoreError> {
        let relative = relative_path(path)?;
        let full = self.root.join(&relative);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, bytes).await?;

        let url = Url::from_file_path(&full)
            .map_err(|_| StoreError::InvalidPath(full.display().to_string()))?;
        Ok(StoredBlob {
            url: url.to_string(),
            pathname: relative.to_string_lossy().into_owned(),
        })
    }

    async fn delete(&self, url: &str) -> Result<(), StoreError> {
        let path = self.path_for_url(url)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process blob store with failure injection.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: DashMap<String, Vec<u8>>,
    fail_puts: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn contains(&self, url: &str) -> bool {
        self.blobs.contains_key(url)
    }

    pub fn get(&self, url: &str) -> Option<Vec<u8>> {
        self.blobs.get(url).map(|b| b.value().clone())
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(
        &self,
        path: &str,
        bytes: &[u8],
        _options: PutOptions,
    ) -> Result<StoredBlob, StoreError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("blob store offline".into()));
        }
        let relative = relative_path(path)?;
        let pathname = relative.to_string_lossy().into_owned();
        let url = format!("memory://blobs/{pathname}");
        self.blobs.insert(url.clone(), bytes.to_vec());
        Ok(StoredBlob { url, pathname })
    }

    async fn delete(&self, url: &str) -> Result<(), StoreError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("blob store offline".into()));
        }
        self.blobs.remove(url);
        Ok(())
    }
}
