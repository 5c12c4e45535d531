// src/lib.rs

//! Packlift
//!
//! Publishes a locally built installer package to a remote
//! device-management service: the installer is encrypted into the
//! service's `ProfileVersion1` envelope, registered inside a fresh
//! content version, streamed to pre-signed object storage, and finally
//! driven through the service's commit state machine.
//!
//! # Architecture
//!
//! - One blocking, sequential pipeline per publish invocation
//! - One deadline threaded through every remote call and poll loop
//! - Retry policy lives in the stages that own it, not the HTTP layer
//! - Temporary artifacts are RAII-owned and removed on every exit path

pub mod config;
pub mod deadline;
pub mod encrypt;
mod error;
pub mod remote;
pub mod upload;

pub use config::PackliftConfig;
pub use deadline::Deadline;
pub use encrypt::{
    decrypt_package, encrypt_package, encrypt_package_to, EncryptedPackage, EncryptionMetadata,
};
pub use error::{Error, Result};
pub use remote::types::UploadState;
pub use remote::{HttpObjectStore, HttpRemoteService, ObjectStore, RemoteEndpoint, RemoteService};
pub use upload::{
    publish_package, Backoff, BackoffConfig, CommitAction, CommitConfig, CommitCoordinator,
    PackageSource, PublishOptions, PublishOutcome, PublishRequest,
};
