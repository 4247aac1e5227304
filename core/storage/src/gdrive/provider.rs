//! Google Drive catalog implementation.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use drivekeep_common::{AppConfig, Error, FileId, Result};

use crate::catalog::{CatalogClient, Listing, MediaChunk, Quota, UploadRequest, LIST_PAGE_SIZE};

use super::auth::Credential;
use super::client::{DriveClient, StorageQuota};

/// Google Drive catalog.
///
/// Implements the CatalogClient trait over the Drive v3 REST API.
pub struct GDriveCatalog {
    client: DriveClient,
}

impl GDriveCatalog {
    /// Wrap an existing client.
    pub fn new(client: DriveClient) -> Self {
        Self { client }
    }

    /// Load the configured credential and build a catalog.
    ///
    /// Only the credential file is read; the first token is requested by
    /// the first catalog call.
    ///
    /// # Errors
    /// - `CredentialNotFound` / `CredentialInvalid` from the key file
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let credential = Credential::from_file(&config.credential_path, &config.scopes)?;
        info!(
            account = %credential.client_email(),
            scopes = credential.scopes().len(),
            "Loaded service account credential"
        );
        let client = DriveClient::new(Arc::new(credential));
        Ok(Self::new(client))
    }
}

/// Create a Google Drive catalog from configuration.
pub fn connect(config: &AppConfig) -> Result<GDriveCatalog> {
    GDriveCatalog::from_config(config)
}

#[async_trait]
impl CatalogClient for GDriveCatalog {
    fn name(&self) -> &str {
        "gdrive"
    }

    async fn quota(&self) -> Result<Quota> {
        let storage = self.client.storage_quota().await?;
        parse_quota(&storage)
    }

    async fn list(&self, parent: Option<&FileId>) -> Result<Listing> {
        let parent = parent.cloned().unwrap_or_else(FileId::root);
        let page = self
            .client
            .list_children(parent.as_str(), LIST_PAGE_SIZE)
            .await?;

        let truncated = page.next_page_token.is_some();
        if truncated {
            warn!(
                folder_id = %parent,
                returned = page.files.len(),
                "Listing has more entries than one page"
            );
        }

        let entries = page
            .files
            .into_iter()
            .map(|file| file.into_entry())
            .collect::<Result<Vec<_>>>()?;

        Ok(Listing { entries, truncated })
    }

    async fn upload(&self, request: UploadRequest) -> Result<FileId> {
        let mut file = match tokio::fs::File::open(&request.source).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::LocalFileMissing(
                    request.source.display().to_string(),
                ));
            }
            Err(e) => {
                return Err(Error::Transfer(format!(
                    "Failed to open {}: {}",
                    request.source.display(),
                    e
                )));
            }
        };

        let metadata = file
            .metadata()
            .await
            .map_err(|e| Error::Transfer(format!("Failed to stat {}: {}", request.source.display(), e)))?;
        if !metadata.is_file() {
            return Err(Error::Transfer(format!(
                "{} is not a regular file",
                request.source.display()
            )));
        }
        let total_size = metadata.len();

        let parent = request.parent_id.as_ref().map(FileId::as_str);
        let created = self
            .client
            .upload_resumable(&request.name, parent, &mut file, total_size)
            .await?;

        let id = FileId::new(created.id)?;
        info!(
            file_id = %id,
            name = %request.name,
            bytes = total_size,
            "Upload complete"
        );

        Ok(id)
    }

    async fn fetch_chunk(&self, id: &FileId, offset: u64, len: u64) -> Result<MediaChunk> {
        self.client.download_range(id.as_str(), offset, len).await
    }
}

/// Convert the API's string-encoded quota.
fn parse_quota(storage: &StorageQuota) -> Result<Quota> {
    let parse = |field: &str, value: &str| {
        value.trim().parse::<u64>().map_err(|e| {
            Error::Service(format!("Invalid storage quota {} '{}': {}", field, value, e))
        })
    };

    let total_bytes = storage
        .limit
        .as_deref()
        .map(|limit| parse("limit", limit))
        .transpose()?;
    let used_bytes = storage
        .usage
        .as_deref()
        .map(|usage| parse("usage", usage))
        .transpose()?
        .unwrap_or(0);

    Ok(Quota {
        total_bytes,
        used_bytes,
    })
}
