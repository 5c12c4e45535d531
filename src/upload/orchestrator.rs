// src/upload/orchestrator.rs

//! Publish orchestration
//!
//! Sequences the whole pipeline under one deadline: resolve the installer
//! source, encrypt, create the parent resource, open a content version,
//! register the file and wait for its storage URI, upload the ciphertext,
//! drive the commit state machine, and finally record the committed
//! content version on the parent resource.
//!
//! The first fatal error from any stage aborts the chain. Temporary
//! artifacts (a downloaded installer copy, the ciphertext) are owned by a
//! [`CleanupGuard`] and removed on every exit path.

use crate::deadline::Deadline;
use crate::encrypt::{self, EncryptedPackage};
use crate::error::{Error, Result};
use crate::remote::types::{CommittedVersion, ResourceSpec};
use crate::remote::{ObjectStore, RemoteService};
use crate::upload::backoff::{Backoff, BackoffConfig};
use crate::upload::cleanup::CleanupGuard;
use crate::upload::commit::{CommitConfig, CommitCoordinator};
use crate::upload::registrar;
use crate::upload::storage;
use rand::thread_rng;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

/// Default overall budget for one publish invocation.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1800);

/// Budget kept back from the deadline for caller-side finalization.
const DEFAULT_SAFETY_MARGIN: Duration = Duration::from_secs(30);

/// Where the installer comes from.
#[derive(Debug, Clone)]
pub enum PackageSource {
    /// Existing local file, not removed after publishing
    LocalPath(PathBuf),
    /// HTTP(S) URL downloaded to a temporary copy
    Url(String),
}

/// Everything one publish invocation needs from the caller.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub source: PackageSource,
    pub resource: ResourceSpec,
}

/// Tuning for a publish invocation.
#[derive(Debug, Clone)]
pub struct PublishOptions {
    /// Overall time budget
    pub timeout: Duration,
    /// Held back from the budget before the deadline is set
    pub safety_margin: Duration,
    /// Commit loop tuning
    pub commit: CommitConfig,
    /// Storage-URI poll backoff
    pub poll: BackoffConfig,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            safety_margin: DEFAULT_SAFETY_MARGIN,
            commit: CommitConfig::default(),
            poll: BackoffConfig::default(),
        }
    }
}

/// Identifiers of a successfully published package.
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    pub resource: crate::remote::types::ResourceId,
    pub content_version: crate::remote::types::ContentVersionId,
    pub content_file: crate::remote::types::ContentFileId,
}

/// Run the full publish pipeline.
pub fn publish_package<S: RemoteService, O: ObjectStore>(
    remote: &S,
    store: &O,
    request: &PublishRequest,
    opts: &PublishOptions,
) -> Result<PublishOutcome> {
    let deadline = Deadline::with_margin(opts.timeout, opts.safety_margin);
    let mut cleanup = CleanupGuard::new();

    // The guard drops (and deletes) on every return path below, error or
    // success alike.
    let installer = resolve_source(&request.source, &deadline, &mut cleanup)?;

    let encrypted = encrypt_stage(&installer, &mut cleanup)?;

    deadline.check()?;
    let resource = remote.create_parent_resource(&request.resource)?;

    let version = registrar::open_content_version(remote, &deadline, &resource)?;

    let allocated = registrar::register_content_file(
        remote,
        &deadline,
        Backoff::new(opts.poll.clone(), thread_rng()),
        &resource,
        &version,
        &encrypted.manifest,
    )?;

    storage::upload_ciphertext(store, &allocated.storage_uri, &encrypted.path, &deadline)?;

    let coordinator = CommitCoordinator::new(opts.commit.clone());
    coordinator.run(
        remote,
        &deadline,
        thread_rng(),
        &resource,
        &version,
        &allocated.id,
        &encrypted.metadata,
    )?;

    deadline.check()?;
    remote.update_parent_resource(
        &resource,
        &CommittedVersion {
            committed_content_version: version.clone(),
        },
    )?;

    info!(
        "Published {} as resource {} (content version {})",
        encrypted.manifest.name, resource, version
    );

    Ok(PublishOutcome {
        resource,
        content_version: version,
        content_file: allocated.id,
    })
}

/// Resolve the installer to a local path, downloading URL sources to a
/// cleanup-tagged temporary copy.
fn resolve_source(
    source: &PackageSource,
    deadline: &Deadline,
    cleanup: &mut CleanupGuard,
) -> Result<PathBuf> {
    match source {
        PackageSource::LocalPath(path) => {
            if !path.is_file() {
                return Err(Error::Io(format!(
                    "Installer not found: {}",
                    path.display()
                )));
            }
            Ok(path.clone())
        }
        PackageSource::Url(raw) => {
            deadline.check()?;
            let url = Url::parse(raw)
                .map_err(|e| Error::Download(format!("Invalid source URL {raw}: {e}")))?;
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(Error::Download(format!(
                    "Unsupported source scheme '{}'",
                    url.scheme()
                )));
            }
            let dest = temp_download_path(&url);
            download_source(&url, &dest)?;
            cleanup.register(&dest);
            Ok(dest)
        }
    }
}

/// Unique staging path for a downloaded installer, keeping the original
/// file name so the manifest stays recognizable.
fn temp_download_path(url: &Url) -> PathBuf {
    let name = url
        .path_segments()
        .and_then(|mut s| s.next_back())
        .filter(|s| !s.is_empty())
        .unwrap_or("package");
    std::env::temp_dir().join(format!("packlift-{}-{name}", Uuid::new_v4()))
}

fn download_source(url: &Url, dest: &Path) -> Result<()> {
    info!("Downloading installer from {}", url);
    let response = reqwest::blocking::get(url.clone())
        .map_err(|e| Error::Download(format!("Failed to fetch {url}: {e}")))?;
    if !response.status().is_success() {
        return Err(Error::Download(format!(
            "HTTP {} from {url}",
            response.status()
        )));
    }
    let mut file = File::create(dest)
        .map_err(|e| Error::Download(format!("Failed to create {}: {e}", dest.display())))?;
    let mut body = response;
    io::copy(&mut body, &mut file)
        .map_err(|e| Error::Download(format!("Failed to write download: {e}")))?;
    Ok(())
}

/// Encrypt the installer, tagging the ciphertext for cleanup. A failed
/// encryption has already removed its partial output.
fn encrypt_stage(installer: &Path, cleanup: &mut CleanupGuard) -> Result<EncryptedPackage> {
    let encrypted = encrypt::encrypt_package(installer)?;
    cleanup.register(&encrypted.path);
    if encrypted.manifest.size == 0 {
        warn!("Installer {} is empty", installer.display());
    }
    Ok(encrypted)
}
