//! Common types shared by the drivekeep crates.
//!
//! This crate holds the error taxonomy every catalog operation reports,
//! the identifier and secret wrappers, and the application configuration
//! passed explicitly into each component.

pub mod config;
pub mod error;
pub mod types;

pub use config::{AppConfig, ConfigOverrides, DRIVE_FILE_SCOPE, DRIVE_SCOPE};
pub use error::{Error, Result};
pub use types::{FileId, SensitiveString};
