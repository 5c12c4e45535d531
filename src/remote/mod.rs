// src/remote/mod.rs

//! Device-management service boundary
//!
//! This module owns everything that crosses the network: the wire data
//! model, the blocking HTTP client, and the two traits the pipeline is
//! written against. The traits are the seam that keeps the state-machine
//! logic testable without a server.

mod client;
pub mod types;

pub use client::{HttpObjectStore, HttpRemoteService, RemoteEndpoint};

use crate::deadline::Deadline;
use crate::error::Result;
use std::path::Path;
use types::{
    CommitRequest, ContentFileId, ContentFileStatus, ContentVersionId, FileManifest,
    CommittedVersion, ResourceId, ResourceSpec,
};

/// Operations the device-management service exposes to this pipeline.
///
/// All calls are blocking and retry-free; retry policy lives in the
/// pipeline stages that own it.
pub trait RemoteService {
    /// Create the owning application record. Consumed as a precondition
    /// of the upload pipeline.
    fn create_parent_resource(&self, spec: &ResourceSpec) -> Result<ResourceId>;

    /// Open a new content-version container on the resource.
    fn open_content_version(&self, resource: &ResourceId) -> Result<ContentVersionId>;

    /// Register file metadata inside a content version.
    fn register_content_file(
        &self,
        resource: &ResourceId,
        version: &ContentVersionId,
        manifest: &FileManifest,
    ) -> Result<ContentFileId>;

    /// Observe the upload state (and storage URI, once allocated) of a
    /// registered content file.
    fn get_content_file(
        &self,
        resource: &ResourceId,
        version: &ContentVersionId,
        file: &ContentFileId,
    ) -> Result<ContentFileStatus>;

    /// Submit the encryption metadata, asking the service to finalize the
    /// uploaded ciphertext.
    fn commit_content_file(
        &self,
        resource: &ResourceId,
        version: &ContentVersionId,
        file: &ContentFileId,
        request: &CommitRequest,
    ) -> Result<()>;

    /// Record the committed content version on the parent resource.
    fn update_parent_resource(
        &self,
        resource: &ResourceId,
        committed: &CommittedVersion,
    ) -> Result<()>;
}

/// Object-storage transfer to a pre-signed, write-capable URI.
pub trait ObjectStore {
    /// Upload a local file to the URI. One logical transfer with one
    /// outcome; implementations may chunk internally.
    fn put_object(&self, uri: &str, local_path: &Path, deadline: &Deadline) -> Result<()>;
}
