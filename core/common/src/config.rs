//! Application configuration.
//!
//! Each binary starts from its own defaults ([`AppConfig::for_backup`],
//! [`AppConfig::for_interactive`]) and may layer a JSON file on top. Every
//! field of the file is optional:
//!
//! ```json
//! {
//!   "credential_path": "/etc/drivekeep/service_account.json",
//!   "backup_root": "/var/opt/emoncms/backup",
//!   "filename_template": "emoncms-backup-{}.tar.gz",
//!   "parent_folder_id": "1AbCdEfGh"
//! }
//! ```

use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::{Error, FileId, Result};

/// Scope limited to files created by this client.
pub const DRIVE_FILE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";
/// Full access to the account's files.
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// Default service-account key file, relative to the working directory.
pub const DEFAULT_CREDENTIAL_PATH: &str = "service_account.json";
/// Directory the nightly backup archive is written to.
pub const DEFAULT_BACKUP_ROOT: &str = "/var/opt/emoncms/backup";
/// Backup archive name; `{}` is replaced by the date.
pub const DEFAULT_FILENAME_TEMPLATE: &str = "emoncms-backup-{}.tar.gz";

const DATE_PLACEHOLDER: &str = "{}";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Configuration passed explicitly into every component.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Path to the service-account key file.
    pub credential_path: PathBuf,
    /// OAuth2 scopes requested for the credential.
    pub scopes: Vec<String>,
    /// Local directory holding backup archives.
    pub backup_root: PathBuf,
    /// Archive name template with a single `{}` date placeholder.
    pub filename_template: String,
    /// Remote folder uploads go to; the account root when absent.
    pub parent_folder_id: Option<FileId>,
}

impl AppConfig {
    /// Defaults for the scheduled backup uploader (file-scoped access).
    pub fn for_backup() -> Self {
        Self {
            credential_path: PathBuf::from(DEFAULT_CREDENTIAL_PATH),
            scopes: vec![DRIVE_FILE_SCOPE.to_string()],
            backup_root: PathBuf::from(DEFAULT_BACKUP_ROOT),
            filename_template: DEFAULT_FILENAME_TEMPLATE.to_string(),
            parent_folder_id: None,
        }
    }

    /// Defaults for the interactive session (full drive access).
    pub fn for_interactive() -> Self {
        Self {
            scopes: vec![DRIVE_SCOPE.to_string()],
            ..Self::for_backup()
        }
    }

    /// Load a JSON file and apply it on top of `base`.
    ///
    /// # Errors
    /// - File cannot be read
    /// - File is not valid JSON or has unknown fields
    /// - Resulting configuration fails [`AppConfig::validate`]
    pub fn load(path: &Path, base: Self) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let overrides = ConfigOverrides::from_json(&json)?;
        let config = base.apply(overrides)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply file overrides. A blank `parent_folder_id` clears the parent.
    pub fn apply(mut self, overrides: ConfigOverrides) -> Result<Self> {
        if let Some(path) = overrides.credential_path {
            self.credential_path = path;
        }
        if let Some(scopes) = overrides.scopes {
            self.scopes = scopes;
        }
        if let Some(root) = overrides.backup_root {
            self.backup_root = root;
        }
        if let Some(template) = overrides.filename_template {
            self.filename_template = template;
        }
        if let Some(parent) = overrides.parent_folder_id {
            self.parent_folder_id = if parent.trim().is_empty() {
                None
            } else {
                Some(FileId::new(parent)?)
            };
        }
        Ok(self)
    }

    /// Check the configuration is usable.
    ///
    /// # Errors
    /// - No scopes
    /// - Template without exactly one `{}` placeholder
    pub fn validate(&self) -> Result<()> {
        if self.scopes.is_empty() {
            return Err(Error::InvalidInput(
                "At least one scope is required".to_string(),
            ));
        }
        let placeholders = self.filename_template.matches(DATE_PLACEHOLDER).count();
        if placeholders != 1 {
            return Err(Error::InvalidInput(format!(
                "Filename template '{}' must contain exactly one '{{}}' placeholder",
                self.filename_template
            )));
        }
        Ok(())
    }

    /// Render the backup archive name for `date`.
    pub fn backup_file_name(&self, date: NaiveDate) -> Result<String> {
        self.validate()?;
        let stamp = date.format(DATE_FORMAT).to_string();
        Ok(self.filename_template.replacen(DATE_PLACEHOLDER, &stamp, 1))
    }

    /// Local path of the backup archive for `date`.
    pub fn backup_file_path(&self, date: NaiveDate) -> Result<PathBuf> {
        Ok(self.backup_root.join(self.backup_file_name(date)?))
    }
}

/// Optional fields read from a configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigOverrides {
    #[serde(default)]
    pub credential_path: Option<PathBuf>,
    #[serde(default)]
    pub scopes: Option<Vec<String>>,
    #[serde(default)]
    pub backup_root: Option<PathBuf>,
    #[serde(default)]
    pub filename_template: Option<String>,
    #[serde(default)]
    pub parent_folder_id: Option<String>,
}

impl ConfigOverrides {
    /// Parse overrides from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))
    }
}
