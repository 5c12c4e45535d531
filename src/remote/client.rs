// src/remote/client.rs

//! Blocking HTTP implementations of the service traits
//!
//! [`HttpRemoteService`] talks JSON to the device-management API with
//! bearer-token auth; [`HttpObjectStore`] streams ciphertext blocks to the
//! pre-signed storage URI and commits the block list. Neither retries:
//! retry policy belongs to the pipeline stages.

use crate::deadline::Deadline;
use crate::error::{Error, Result};
use crate::remote::types::{
    CommitRequest, CommittedVersion, ContentFileId, ContentFileStatus, ContentVersionId,
    FileManifest, ResourceId, ResourceSpec,
};
use crate::remote::{ObjectStore, RemoteService};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

/// Timeout for API requests (30 seconds)
const API_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for a single storage block transfer (10 minutes)
const STORAGE_TIMEOUT: Duration = Duration::from_secs(600);

/// Storage upload block size (4 MiB)
const BLOCK_SIZE: usize = 4 * 1024 * 1024;

/// Endpoint and credentials for the device-management service.
#[derive(Debug, Clone)]
pub struct RemoteEndpoint {
    /// Base URL of the service API
    pub base_url: Url,
    /// Bearer token presented on every request
    pub token: String,
}

/// Minimal id-bearing response shared by the create operations.
#[derive(Debug, Deserialize)]
struct IdResponse {
    id: String,
}

/// Blocking JSON client for the device-management API.
pub struct HttpRemoteService {
    client: Client,
    endpoint: RemoteEndpoint,
}

impl HttpRemoteService {
    pub fn new(endpoint: RemoteEndpoint) -> Result<Self> {
        let client = Client::builder()
            .timeout(API_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client, endpoint })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.endpoint
            .base_url
            .join(path)
            .map_err(|e| Error::Config(format!("Invalid API path {path}: {e}")))
    }

    /// Send a request with auth and a fresh correlation id, mapping any
    /// transport or HTTP-status failure into a `Remote` error naming the
    /// operation.
    fn send(
        &self,
        operation: &str,
        req: reqwest::blocking::RequestBuilder,
    ) -> Result<reqwest::blocking::Response> {
        let correlation_id = Uuid::new_v4().to_string();
        let response = req
            .bearer_auth(&self.endpoint.token)
            .header("client-request-id", &correlation_id)
            .send()
            .map_err(|e| Error::remote(operation, e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::remote(
                operation,
                format!(
                    "HTTP {} (client-request-id {})",
                    response.status(),
                    correlation_id
                ),
            ));
        }
        debug!("{} succeeded (client-request-id {})", operation, correlation_id);
        Ok(response)
    }
}

impl RemoteService for HttpRemoteService {
    fn create_parent_resource(&self, spec: &ResourceSpec) -> Result<ResourceId> {
        let url = self.url("apps")?;
        let response = self.send("createParentResource", self.client.post(url).json(spec))?;
        let body: IdResponse = response
            .json()
            .map_err(|e| Error::remote("createParentResource", format!("Invalid body: {e}")))?;
        info!("Created parent resource {}", body.id);
        Ok(ResourceId(body.id))
    }

    fn open_content_version(&self, resource: &ResourceId) -> Result<ContentVersionId> {
        let url = self.url(&format!("apps/{resource}/contentVersions"))?;
        let response = self.send(
            "openContentVersion",
            self.client.post(url).json(&serde_json::json!({})),
        )?;
        let body: IdResponse = response
            .json()
            .map_err(|e| Error::remote("openContentVersion", format!("Invalid body: {e}")))?;
        info!("Opened content version {}", body.id);
        Ok(ContentVersionId(body.id))
    }

    fn register_content_file(
        &self,
        resource: &ResourceId,
        version: &ContentVersionId,
        manifest: &FileManifest,
    ) -> Result<ContentFileId> {
        let url = self.url(&format!("apps/{resource}/contentVersions/{version}/files"))?;
        let response = self.send(
            "registerContentFile",
            self.client.post(url).json(manifest),
        )?;
        let body: IdResponse = response
            .json()
            .map_err(|e| Error::remote("registerContentFile", format!("Invalid body: {e}")))?;
        info!("Registered content file {}", body.id);
        Ok(ContentFileId(body.id))
    }

    fn get_content_file(
        &self,
        resource: &ResourceId,
        version: &ContentVersionId,
        file: &ContentFileId,
    ) -> Result<ContentFileStatus> {
        let url = self.url(&format!(
            "apps/{resource}/contentVersions/{version}/files/{file}"
        ))?;
        let response = self.send("getContentFile", self.client.get(url))?;
        response
            .json()
            .map_err(|e| Error::remote("getContentFile", format!("Invalid body: {e}")))
    }

    fn commit_content_file(
        &self,
        resource: &ResourceId,
        version: &ContentVersionId,
        file: &ContentFileId,
        request: &CommitRequest,
    ) -> Result<()> {
        let url = self.url(&format!(
            "apps/{resource}/contentVersions/{version}/files/{file}/commit"
        ))?;
        self.send("commitContentFile", self.client.post(url).json(request))?;
        Ok(())
    }

    fn update_parent_resource(
        &self,
        resource: &ResourceId,
        committed: &CommittedVersion,
    ) -> Result<()> {
        let url = self.url(&format!("apps/{resource}"))?;
        self.send("updateParentResource", self.client.patch(url).json(committed))?;
        info!(
            "Recorded committed content version {} on {}",
            committed.committed_content_version, resource
        );
        Ok(())
    }
}

/// Block uploader for pre-signed block-blob URIs.
pub struct HttpObjectStore {
    client: Client,
    show_progress: bool,
}

impl HttpObjectStore {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(STORAGE_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            show_progress: false,
        })
    }

    /// Enable a progress bar during the transfer.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    fn progress_bar(&self, total: u64) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}) {msg}")
                .expect("Invalid progress bar template")
                .progress_chars("#>-"),
        );
        pb.set_message("uploading");
        Some(pb)
    }
}

/// Append a query parameter to a pre-signed URI that may already carry
/// signature parameters.
fn uri_with_params(uri: &str, params: &str) -> String {
    if uri.contains('?') {
        format!("{uri}&{params}")
    } else {
        format!("{uri}?{params}")
    }
}

/// Base64 block id for block `index`, fixed width so ids sort correctly.
fn block_id(index: usize) -> String {
    BASE64.encode(format!("block-{index:08}"))
}

impl ObjectStore for HttpObjectStore {
    fn put_object(&self, uri: &str, local_path: &Path, deadline: &Deadline) -> Result<()> {
        let mut file = File::open(local_path)
            .map_err(|e| Error::Upload(format!("Failed to open {}: {e}", local_path.display())))?;
        let total = file
            .metadata()
            .map_err(|e| Error::Upload(format!("Failed to stat {}: {e}", local_path.display())))?
            .len();

        info!("Uploading {} bytes to object storage", total);
        let pb = self.progress_bar(total);

        let mut block_ids = Vec::new();
        let mut buffer = vec![0u8; BLOCK_SIZE];
        let mut sent: u64 = 0;
        loop {
            deadline.check()?;

            // Fill a whole block if the stream delivers short reads.
            let mut filled = 0usize;
            while filled < BLOCK_SIZE {
                let read = file
                    .read(&mut buffer[filled..])
                    .map_err(|e| Error::Upload(format!("Failed to read ciphertext: {e}")))?;
                if read == 0 {
                    break;
                }
                filled += read;
            }
            if filled == 0 {
                break;
            }

            let id = block_id(block_ids.len());
            let block_uri = uri_with_params(uri, &format!("comp=block&blockid={id}"));
            let response = self
                .client
                .put(block_uri.as_str())
                .body(buffer[..filled].to_vec())
                .send()
                .map_err(|e| Error::Upload(format!("Block transfer failed: {e}")))?;
            if !response.status().is_success() {
                return Err(Error::Upload(format!(
                    "Block transfer failed: HTTP {}",
                    response.status()
                )));
            }
            block_ids.push(id);
            sent += filled as u64;
            if let Some(ref pb) = pb {
                pb.set_position(sent);
            }
            if filled < BLOCK_SIZE {
                break;
            }
        }

        // Commit the block list so storage assembles the blob.
        deadline.check()?;
        let mut list = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?><BlockList>");
        for id in &block_ids {
            list.push_str(&format!("<Latest>{id}</Latest>"));
        }
        list.push_str("</BlockList>");

        let list_uri = uri_with_params(uri, "comp=blocklist");
        let response = self
            .client
            .put(list_uri.as_str())
            .header("Content-Type", "application/xml")
            .body(list)
            .send()
            .map_err(|e| Error::Upload(format!("Block list commit failed: {e}")))?;
        if !response.status().is_success() {
            return Err(Error::Upload(format!(
                "Block list commit failed: HTTP {}",
                response.status()
            )));
        }

        if let Some(pb) = pb {
            pb.finish_with_message("uploaded");
        }
        info!("Upload complete ({} blocks, {} bytes)", block_ids.len(), sent);
        Ok(())
    }
}
