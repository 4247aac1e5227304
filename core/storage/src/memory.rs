//! In-memory catalog for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

use drivekeep_common::{Error, FileId, Result};

use crate::catalog::{
    CatalogClient, Listing, MediaChunk, Quota, RemoteEntry, UploadRequest, DEFAULT_DOWNLOAD_CHUNK,
    LIST_PAGE_SIZE,
};

/// Default storage limit (15 GiB).
const DEFAULT_LIMIT: u64 = 15 * 1024 * 1024 * 1024;

#[derive(Debug, Clone)]
struct StoredObject {
    entry: RemoteEntry,
    data: Vec<u8>,
}

/// In-memory catalog.
///
/// Behaves like the remote service for the operations drivekeep uses:
/// service-assigned IDs, duplicate names allowed, one page per listing.
/// Every trait call is counted so tests can assert that no remote
/// operation happened.
pub struct MemoryCatalog {
    objects: RwLock<Vec<StoredObject>>,
    total_bytes: Option<u64>,
    chunk_size: u64,
    calls: AtomicUsize,
}

impl MemoryCatalog {
    /// Create an empty catalog with a 15 GiB limit.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(Vec::new()),
            total_bytes: Some(DEFAULT_LIMIT),
            chunk_size: DEFAULT_DOWNLOAD_CHUNK,
            calls: AtomicUsize::new(0),
        }
    }

    /// Set the storage limit; `None` for unlimited.
    pub fn with_limit(mut self, total_bytes: Option<u64>) -> Self {
        self.total_bytes = total_bytes;
        self
    }

    /// Set the download chunk size.
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Seed a folder without counting a call.
    pub fn create_folder(&self, name: &str, parent: Option<&FileId>) -> Result<FileId> {
        self.insert(name, RemoteEntry::FOLDER_MIME_TYPE, parent, Vec::new())
    }

    /// Seed a file without counting a call.
    pub fn insert_file(
        &self,
        name: &str,
        parent: Option<&FileId>,
        data: Vec<u8>,
    ) -> Result<FileId> {
        self.insert(name, "application/octet-stream", parent, data)
    }

    /// Content of a stored file.
    pub fn contents(&self, id: &FileId) -> Option<Vec<u8>> {
        self.read()
            .iter()
            .find(|obj| &obj.entry.id == id)
            .map(|obj| obj.data.clone())
    }

    /// Number of [`CatalogClient`] calls served so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn insert(
        &self,
        name: &str,
        mime_type: &str,
        parent: Option<&FileId>,
        data: Vec<u8>,
    ) -> Result<FileId> {
        let id = FileId::new(Uuid::new_v4().simple().to_string())?;
        let entry = RemoteEntry {
            id: id.clone(),
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            parents: vec![parent.cloned().unwrap_or_else(FileId::root)],
        };

        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(StoredObject { entry, data });

        Ok(id)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<StoredObject>> {
        self.objects.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn is_folder(&self, id: &FileId) -> bool {
        *id == FileId::root()
            || self
                .read()
                .iter()
                .any(|obj| &obj.entry.id == id && obj.entry.is_folder())
    }
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CatalogClient for MemoryCatalog {
    fn name(&self) -> &str {
        "memory"
    }

    async fn quota(&self) -> Result<Quota> {
        self.record_call();
        let used_bytes = self.read().iter().map(|obj| obj.data.len() as u64).sum();
        Ok(Quota {
            total_bytes: self.total_bytes,
            used_bytes,
        })
    }

    async fn list(&self, parent: Option<&FileId>) -> Result<Listing> {
        self.record_call();
        let parent = parent.cloned().unwrap_or_else(FileId::root);

        let children: Vec<RemoteEntry> = self
            .read()
            .iter()
            .filter(|obj| obj.entry.parents.contains(&parent))
            .map(|obj| obj.entry.clone())
            .collect();

        let truncated = children.len() > LIST_PAGE_SIZE;
        let entries = children.into_iter().take(LIST_PAGE_SIZE).collect();

        Ok(Listing { entries, truncated })
    }

    async fn upload(&self, request: UploadRequest) -> Result<FileId> {
        self.record_call();

        let data = match tokio::fs::read(&request.source).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::LocalFileMissing(
                    request.source.display().to_string(),
                ));
            }
            Err(e) => {
                return Err(Error::Transfer(format!(
                    "Failed to read {}: {}",
                    request.source.display(),
                    e
                )));
            }
        };

        if let Some(parent) = &request.parent_id {
            if !self.is_folder(parent) {
                return Err(Error::NotFound(format!("Folder not found: {}", parent)));
            }
        }

        self.insert_file(&request.name, request.parent_id.as_ref(), data)
    }

    async fn fetch_chunk(&self, id: &FileId, offset: u64, len: u64) -> Result<MediaChunk> {
        self.record_call();
        let objects = self.read();
        let object = objects
            .iter()
            .find(|obj| &obj.entry.id == id)
            .ok_or_else(|| Error::NotFound(format!("File not found: {}", id)))?;

        if object.entry.is_folder() {
            return Err(Error::InvalidInput(format!(
                "Cannot download folder {}",
                id
            )));
        }

        let total_size = object.data.len() as u64;
        let start = offset.min(total_size) as usize;
        let end = offset.saturating_add(len).min(total_size) as usize;

        Ok(MediaChunk {
            data: object.data[start..end].to_vec(),
            total_size,
        })
    }

    fn download_chunk_size(&self) -> u64 {
        self.chunk_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn local_file(content: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file
    }

    #[tokio::test]
    async fn test_upload_then_list() {
        let catalog = MemoryCatalog::new();
        let source = local_file(b"archive");

        let request = UploadRequest::new(source.path(), "backup.tar.gz").unwrap();
        let id = catalog.upload(request).await.unwrap();

        let listing = catalog.list(None).await.unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing.entries[0].id, id);
        assert_eq!(listing.entries[0].name, "backup.tar.gz");
        assert!(!listing.truncated);
        assert_eq!(catalog.contents(&id).unwrap(), b"archive");
    }

    #[tokio::test]
    async fn test_duplicate_names_allowed() {
        let catalog = MemoryCatalog::new();
        let folder = catalog.create_folder("backups", None).unwrap();
        let source = local_file(b"x");

        let first = catalog
            .upload(
                UploadRequest::new(source.path(), "same.tar.gz")
                    .unwrap()
                    .with_parent(Some(folder.clone())),
            )
            .await
            .unwrap();
        let second = catalog
            .upload(
                UploadRequest::new(source.path(), "same.tar.gz")
                    .unwrap()
                    .with_parent(Some(folder.clone())),
            )
            .await
            .unwrap();

        assert_ne!(first, second);
        let listing = catalog.list(Some(&folder)).await.unwrap();
        assert_eq!(listing.len(), 2);
        assert!(listing.entries.iter().all(|e| e.name == "same.tar.gz"));
    }

    #[tokio::test]
    async fn test_list_only_immediate_children() {
        let catalog = MemoryCatalog::new();
        let folder = catalog.create_folder("a", None).unwrap();
        catalog.insert_file("nested.txt", Some(&folder), vec![1]).unwrap();
        catalog.insert_file("top.txt", None, vec![2]).unwrap();

        let root = catalog.list(None).await.unwrap();
        let names: Vec<&str> = root.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "top.txt"]);

        let inside = catalog.list(Some(&folder)).await.unwrap();
        assert_eq!(inside.entries[0].name, "nested.txt");
    }

    #[tokio::test]
    async fn test_list_unknown_parent_is_empty() {
        let catalog = MemoryCatalog::new();
        let listing = catalog
            .list(Some(&FileId::new("nope").unwrap()))
            .await
            .unwrap();
        assert!(listing.is_empty());
    }

    #[tokio::test]
    async fn test_list_caps_at_one_page() {
        let catalog = MemoryCatalog::new();
        for i in 0..(LIST_PAGE_SIZE + 5) {
            catalog.insert_file(&format!("f{}", i), None, Vec::new()).unwrap();
        }

        let listing = catalog.list(None).await.unwrap();
        assert_eq!(listing.len(), LIST_PAGE_SIZE);
        assert!(listing.truncated);
    }

    #[tokio::test]
    async fn test_upload_missing_source() {
        let catalog = MemoryCatalog::new();
        let request = UploadRequest::new("/definitely/not/here.tar.gz", "here.tar.gz").unwrap();

        let result = catalog.upload(request).await;
        assert!(matches!(result, Err(Error::LocalFileMissing(_))));
        assert!(catalog.list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_into_missing_folder() {
        let catalog = MemoryCatalog::new();
        let source = local_file(b"x");
        let request = UploadRequest::new(source.path(), "x")
            .unwrap()
            .with_parent(Some(FileId::new("ghost").unwrap()));

        assert!(matches!(
            catalog.upload(request).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_quota_tracks_usage() {
        let catalog = MemoryCatalog::new().with_limit(Some(100));
        catalog.insert_file("a", None, vec![0; 40]).unwrap();

        let quota = catalog.quota().await.unwrap();
        assert_eq!(quota.total_bytes, Some(100));
        assert_eq!(quota.used_bytes, 40);
        assert_eq!(quota.free_bytes(), Some(60));
    }

    #[tokio::test]
    async fn test_fetch_chunk_ranges() {
        let catalog = MemoryCatalog::new();
        let id = catalog.insert_file("a", None, b"abcdef".to_vec()).unwrap();

        let chunk = catalog.fetch_chunk(&id, 2, 3).await.unwrap();
        assert_eq!(chunk.data, b"cde");
        assert_eq!(chunk.total_size, 6);

        let tail = catalog.fetch_chunk(&id, 4, 100).await.unwrap();
        assert_eq!(tail.data, b"ef");

        let folder = catalog.create_folder("dir", None).unwrap();
        assert!(catalog.fetch_chunk(&folder, 0, 1).await.is_err());
    }

    #[tokio::test]
    async fn test_calls_counted() {
        let catalog = MemoryCatalog::new();
        catalog.insert_file("seed", None, vec![]).unwrap();
        assert_eq!(catalog.call_count(), 0);

        catalog.quota().await.unwrap();
        catalog.list(None).await.unwrap();
        assert_eq!(catalog.call_count(), 2);
    }
}
