//! Catalog client trait definition.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use drivekeep_common::{Error, FileId, Result};

use crate::transfer::{self, Progress};

/// Maximum number of entries a single listing returns.
pub const LIST_PAGE_SIZE: usize = 1000;

/// Default size of one ranged download request (100 MiB).
pub const DEFAULT_DOWNLOAD_CHUNK: u64 = 100 * 1024 * 1024;

/// Storage accounting for the authenticated account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quota {
    /// Storage limit in bytes; `None` for unlimited accounts.
    pub total_bytes: Option<u64>,
    /// Bytes in use across all services.
    pub used_bytes: u64,
}

impl Quota {
    /// Remaining space, or `None` when there is no limit.
    pub fn free_bytes(&self) -> Option<u64> {
        self.total_bytes
            .map(|total| total.saturating_sub(self.used_bytes))
    }
}

/// A file or folder tracked by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub id: FileId,
    pub name: String,
    pub mime_type: String,
    /// Containing folders. Zero or more; not necessarily a tree.
    pub parents: Vec<FileId>,
}

impl RemoteEntry {
    /// MIME type the service uses for folders.
    pub const FOLDER_MIME_TYPE: &'static str = "application/vnd.google-apps.folder";

    /// Check if this is a folder.
    pub fn is_folder(&self) -> bool {
        self.mime_type == Self::FOLDER_MIME_TYPE
    }
}

/// One page of a folder listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub entries: Vec<RemoteEntry>,
    /// The service reported more entries than the single page returned.
    pub truncated: bool,
}

impl Listing {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Everything needed to create one remote object. Consumed by the upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    /// Local file to read.
    pub source: PathBuf,
    /// Display name of the new object.
    pub name: String,
    /// Folder to create the object in; the account root when absent.
    pub parent_id: Option<FileId>,
}

impl UploadRequest {
    /// Create an upload descriptor.
    ///
    /// # Errors
    /// - `name` is blank
    pub fn new(source: impl Into<PathBuf>, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::InvalidInput("File name cannot be empty".to_string()));
        }
        Ok(Self {
            source: source.into(),
            name,
            parent_id: None,
        })
    }

    /// Set the destination folder.
    pub fn with_parent(mut self, parent_id: Option<FileId>) -> Self {
        self.parent_id = parent_id;
        self
    }
}

/// Bytes returned by one ranged read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaChunk {
    pub data: Vec<u8>,
    /// Size of the whole object, as reported by the service.
    pub total_size: u64,
}

/// Catalog client trait for remote object storage.
///
/// Calls are sequential: each one runs to completion, including every
/// chunk of a transfer, before control returns.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Backend name (e.g., "gdrive", "memory").
    fn name(&self) -> &str;

    /// Query storage accounting.
    ///
    /// # Errors
    /// - `Service` on transport or authorization failure
    async fn quota(&self) -> Result<Quota>;

    /// List up to [`LIST_PAGE_SIZE`] immediate children of `parent`, or of
    /// the root when `parent` is `None`.
    ///
    /// Only the first page is fetched; [`Listing::truncated`] tells the
    /// caller whether more entries exist. No matches is an empty listing.
    async fn list(&self, parent: Option<&FileId>) -> Result<Listing>;

    /// Create a new remote object from a local file.
    ///
    /// Objects with the same name are never merged; duplicates are allowed.
    ///
    /// # Errors
    /// - `LocalFileMissing` if the source does not exist
    /// - `Transfer` on I/O failure or service rejection
    async fn upload(&self, request: UploadRequest) -> Result<FileId>;

    /// Read `len` bytes of an object starting at `offset`.
    ///
    /// Reading at or past the end of an empty object yields an empty chunk.
    ///
    /// # Errors
    /// - `NotFound` if the object does not exist
    /// - `Transfer` on network failure
    async fn fetch_chunk(&self, id: &FileId, offset: u64, len: u64) -> Result<MediaChunk>;

    /// Bytes requested per [`CatalogClient::fetch_chunk`] during a download.
    fn download_chunk_size(&self) -> u64 {
        DEFAULT_DOWNLOAD_CHUNK
    }

    /// Download an object to `destination`, reporting progress per chunk.
    ///
    /// # Postconditions
    /// - On success `destination` holds the complete content
    /// - On failure `destination` is neither created nor truncated
    ///
    /// # Errors
    /// - `NotFound` if the object does not exist
    /// - `Transfer` if a chunk or the final write fails
    async fn download(
        &self,
        id: &FileId,
        destination: &Path,
        on_progress: &mut (dyn FnMut(Progress) + Send),
    ) -> Result<u64> {
        transfer::download_to_path(self, id, destination, on_progress).await
    }
}
