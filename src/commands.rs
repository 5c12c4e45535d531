// src/commands.rs
//! Command handlers for the packlift CLI

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use packlift::encrypt::{self, EncryptionMetadata};
use packlift::remote::types::{FileEncryptionInfo, FileManifest, ResourceSpec};
use packlift::{
    publish_package, HttpObjectStore, HttpRemoteService, PackageSource, PackliftConfig,
    PublishRequest,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Metadata document written by `packlift encrypt` and read back by
/// `packlift decrypt`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EncryptionReport {
    file_encryption_info: FileEncryptionInfo,
    manifest: FileManifest,
    ciphertext_path: PathBuf,
}

#[allow(clippy::too_many_arguments)]
pub fn publish(
    source: &str,
    name: &str,
    publisher: &str,
    description: Option<String>,
    config_path: Option<&Path>,
    endpoint: Option<&str>,
    token: Option<&str>,
    timeout_secs: Option<u64>,
    no_progress: bool,
) -> Result<()> {
    let config = PackliftConfig::load(config_path)?;
    let remote = HttpRemoteService::new(config.endpoint(endpoint, token)?)?;
    let store = HttpObjectStore::new()?.with_progress(!no_progress);

    let package_source = if source.starts_with("http://") || source.starts_with("https://") {
        PackageSource::Url(source.to_string())
    } else {
        PackageSource::LocalPath(PathBuf::from(source))
    };

    let file_name = match &package_source {
        PackageSource::LocalPath(p) => p
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "package".to_string()),
        PackageSource::Url(u) => u
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("package")
            .to_string(),
    };

    let request = PublishRequest {
        source: package_source,
        resource: ResourceSpec {
            display_name: name.to_string(),
            publisher: publisher.to_string(),
            description,
            file_name,
        },
    };

    let mut opts = config.publish_options();
    if let Some(secs) = timeout_secs {
        opts.timeout = Duration::from_secs(secs);
    }

    let outcome = publish_package(&remote, &store, &request, &opts)?;
    println!(
        "Published '{}' as resource {} (content version {}, file {})",
        name, outcome.resource, outcome.content_version, outcome.content_file
    );
    Ok(())
}

pub fn encrypt(source: &Path, output: Option<&Path>, metadata_out: &Path) -> Result<()> {
    let encrypted = match output {
        Some(dest) => encrypt::encrypt_package_to(source, dest)?,
        None => encrypt::encrypt_package(source)?,
    };

    let report = EncryptionReport {
        file_encryption_info: FileEncryptionInfo::from_metadata(&encrypted.metadata),
        manifest: encrypted.manifest.clone(),
        ciphertext_path: encrypted.path.clone(),
    };
    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(metadata_out, json)
        .with_context(|| format!("Failed to write {}", metadata_out.display()))?;

    info!("Wrote encryption metadata to {}", metadata_out.display());
    println!(
        "Encrypted {} -> {} ({} bytes)",
        source.display(),
        encrypted.path.display(),
        encrypted.manifest.size_encrypted
    );
    Ok(())
}

pub fn decrypt(encrypted: &Path, metadata: &Path, output: &Path) -> Result<()> {
    let content = std::fs::read_to_string(metadata)
        .with_context(|| format!("Failed to read {}", metadata.display()))?;
    let report: EncryptionReport =
        serde_json::from_str(&content).context("Invalid encryption metadata JSON")?;

    let meta = metadata_from_report(&report)?;
    encrypt::decrypt_package(encrypted, &meta, output)?;
    println!(
        "Decrypted {} -> {}",
        encrypted.display(),
        output.display()
    );
    Ok(())
}

fn metadata_from_report(report: &EncryptionReport) -> Result<EncryptionMetadata> {
    let info = &report.file_encryption_info;
    let decode = |label: &str, value: &str| -> Result<Vec<u8>> {
        BASE64
            .decode(value)
            .with_context(|| format!("Invalid base64 in field {label}"))
    };
    Ok(EncryptionMetadata {
        encryption_key: decode("encryptionKey", &info.encryption_key)?,
        mac_key: decode("macKey", &info.mac_key)?,
        initialization_vector: decode("initializationVector", &info.initialization_vector)?,
        mac: decode("mac", &info.mac)?,
        file_digest: decode("fileDigest", &info.file_digest)?,
        profile_identifier: info.profile_identifier.clone(),
        file_digest_algorithm: info.file_digest_algorithm.clone(),
        size: report.manifest.size,
        size_encrypted: report.manifest.size_encrypted,
    })
}
