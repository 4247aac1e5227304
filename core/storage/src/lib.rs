//! Remote catalog client for drivekeep.
//!
//! This crate provides the [`CatalogClient`] trait (quota, list, upload,
//! chunked download), the transfer engine that turns ranged chunk fetches
//! into progress events and atomic file writes, an in-memory catalog, and
//! the Google Drive implementation.
//!
//! # Design Principles
//! - One call at a time: every operation runs to completion before returning
//! - No partial output: downloads are assembled in memory and renamed into place
//! - Unified error semantics: every backend reports [`drivekeep_common::Error`]

pub mod catalog;
pub mod gdrive;
pub mod memory;
pub mod transfer;

pub use catalog::{CatalogClient, Listing, MediaChunk, Quota, RemoteEntry, UploadRequest};
pub use gdrive::{connect, Credential, DriveClient, GDriveCatalog};
pub use memory::MemoryCatalog;
pub use transfer::{Download, Progress, TransferEvent, TransferState};
