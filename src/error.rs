// src/error.rs

//! Error types for the packlift pipeline
//!
//! Every stage of the publish pipeline fails with one of these variants.
//! All of them are fatal to the enclosing orchestration except the
//! failed/timed-out commit states, which the commit coordinator recovers
//! by resubmitting the commit request inside its bounded loop.

use crate::remote::types::UploadState;
use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The installer could not be read or the cipher pipeline failed.
    /// Fatal; no partial ciphertext is left behind.
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// A device-management service call failed (content version or file
    /// registration, commit submission, resource update).
    #[error("Remote operation '{operation}' failed: {message}")]
    Remote { operation: String, message: String },

    /// The remote service could not allocate a writable storage URI for
    /// the registered content file.
    #[error("Storage URI allocation failed (last state: {state})")]
    StorageAllocation { state: UploadState },

    /// The object-storage transfer failed. The whole pipeline must be
    /// restarted from encryption; uploads are not resumable.
    #[error("Upload failed: {0}")]
    Upload(String),

    /// The commit poll loop exhausted its attempt budget without the
    /// remote service reaching a terminal state.
    #[error("Commit not confirmed after {attempts} attempts (last state: {last_state})")]
    CommitTimeout { attempts: u32, last_state: UploadState },

    /// The caller-supplied deadline expired before the pipeline finished.
    #[error("Deadline exceeded ({overrun_ms} ms past the deadline)")]
    DeadlineExceeded { overrun_ms: u64 },

    /// Downloading a remote installer source failed.
    #[error("Download failed: {0}")]
    Download(String),

    /// Local filesystem failure.
    #[error("IO error: {0}")]
    Io(String),

    /// Invalid or unreadable configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Build a `Remote` error naming the failing operation.
    pub fn remote(operation: &str, message: impl Into<String>) -> Self {
        Error::Remote {
            operation: operation.to_string(),
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}
