//! Google Drive catalog backend.
//!
//! - Service-account authentication with lazily minted bearer tokens
//! - Resumable chunked uploads
//! - Ranged chunked downloads
//! - Single-page folder listings and storage quota

pub mod auth;
pub mod client;
pub mod provider;

pub use auth::{Credential, ServiceAccountKey, Tokens};
pub use client::{DriveClient, DriveFile};
pub use provider::{connect, GDriveCatalog};
