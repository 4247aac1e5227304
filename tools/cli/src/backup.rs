//! Scheduled backup upload.
//!
//! One invocation uploads one archive: the file named after `today` in the
//! configured backup root. The local file is checked before the credential
//! is loaded, so a missing archive never touches the network. There is no
//! retry; the next scheduled run is the retry.

use chrono::NaiveDate;
use std::path::PathBuf;
use tracing::info;

use drivekeep_common::{AppConfig, Error, FileId, Result};
use drivekeep_storage::{CatalogClient, UploadRequest};

/// The archive a run will upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupPlan {
    /// Remote name, identical to the local file name.
    pub file_name: String,
    pub local_path: PathBuf,
    pub parent_id: Option<FileId>,
}

impl BackupPlan {
    /// Locate the archive for `today`.
    ///
    /// # Errors
    /// - `InvalidInput` if the filename template is unusable
    /// - `LocalFileMissing` if the archive does not exist
    pub fn resolve(config: &AppConfig, today: NaiveDate) -> Result<Self> {
        let file_name = config.backup_file_name(today)?;
        let local_path = config.backup_root.join(&file_name);

        if !local_path.is_file() {
            return Err(Error::LocalFileMissing(local_path.display().to_string()));
        }

        Ok(Self {
            file_name,
            local_path,
            parent_id: config.parent_folder_id.clone(),
        })
    }
}

/// A completed backup upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupReceipt {
    pub file_name: String,
    pub file_id: FileId,
}

/// Upload the planned archive once.
pub async fn run_backup<C: CatalogClient + ?Sized>(catalog: &C, plan: &BackupPlan) -> Result<FileId> {
    info!(
        path = %plan.local_path.display(),
        backend = catalog.name(),
        "Uploading backup archive"
    );

    let request = UploadRequest::new(&plan.local_path, &plan.file_name)?
        .with_parent(plan.parent_id.clone());
    catalog.upload(request).await
}

/// Resolve today's archive, connect, and upload it.
///
/// `connect` is only called once the archive is known to exist.
pub async fn run<C, F>(config: &AppConfig, today: NaiveDate, connect: F) -> Result<BackupReceipt>
where
    C: CatalogClient,
    F: FnOnce(&AppConfig) -> Result<C>,
{
    let plan = BackupPlan::resolve(config, today)?;
    let catalog = connect(config)?;
    let file_id = run_backup(&catalog, &plan).await?;

    Ok(BackupReceipt {
        file_name: plan.file_name,
        file_id,
    })
}

/// One-line outcome for stdout.
pub fn report(outcome: &Result<BackupReceipt>) -> String {
    match outcome {
        Ok(receipt) => format!(
            "File '{}' uploaded successfully. File ID: {}",
            receipt.file_name, receipt.file_id
        ),
        Err(Error::LocalFileMissing(path)) => format!("Error: File not found at '{}'", path),
        Err(e) => format!("An error occurred during upload: {}", e),
    }
}
