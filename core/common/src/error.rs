//! Common error types for drivekeep.

use thiserror::Error;

/// Top-level error type for catalog, credential, and backup operations.
///
/// Every failure is terminal for the operation that produced it and
/// non-fatal for the process: front ends print the message and carry on.
#[derive(Debug, Error)]
pub enum Error {
    /// The service credential file does not exist.
    #[error("Credential file not found: {0}")]
    CredentialNotFound(String),

    /// The service credential is malformed or was rejected by the service.
    #[error("Invalid credential: {0}")]
    CredentialInvalid(String),

    /// A local file that should be uploaded does not exist.
    #[error("File not found at '{0}'")]
    LocalFileMissing(String),

    /// The remote object does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network or I/O failure in the middle of a transfer.
    #[error("Transfer error: {0}")]
    Transfer(String),

    /// Generic API or transport failure outside a transfer.
    #[error("Service error: {0}")]
    Service(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
