// src/remote/types.rs

//! Wire data model for the device-management service
//!
//! Identifiers, the content-file upload state machine, and the JSON bodies
//! exchanged with the service. Field names on the wire are camelCase.
//!
//! [`UploadState`] is the contract surface between this pipeline and the
//! service: the pipeline never writes it, it only observes it via polling
//! and reacts per the commit coordinator's state table. Unknown values
//! deserialize to [`UploadState::Unrecognized`] so that new server-side
//! states do not break the client.

use crate::encrypt::EncryptionMetadata;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Server-assigned identifier of the parent application resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceId(pub String);

/// Server-assigned identifier of a content version container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentVersionId(pub String);

/// Server-assigned identifier of a content file within a version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentFileId(pub String);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ContentVersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ContentFileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage-allocation and commit progress of a content file.
///
/// Reported by the service on every `get_content_file` poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UploadState {
    StorageUriRequestSuccess,
    StorageUriRequestPending,
    StorageUriRequestFailed,
    StorageUriRequestTimedOut,
    StorageUriRenewalSuccess,
    StorageUriRenewalPending,
    StorageUriRenewalFailed,
    StorageUriRenewalTimedOut,
    CommitFileSuccess,
    CommitFilePending,
    CommitFileFailed,
    CommitFileTimedOut,
    Success,
    TransientError,
    Error,
    Unknown,
    /// Forward-compatibility arm for states this client does not know.
    #[serde(other)]
    Unrecognized,
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UploadState::StorageUriRequestSuccess => "storageUriRequestSuccess",
            UploadState::StorageUriRequestPending => "storageUriRequestPending",
            UploadState::StorageUriRequestFailed => "storageUriRequestFailed",
            UploadState::StorageUriRequestTimedOut => "storageUriRequestTimedOut",
            UploadState::StorageUriRenewalSuccess => "storageUriRenewalSuccess",
            UploadState::StorageUriRenewalPending => "storageUriRenewalPending",
            UploadState::StorageUriRenewalFailed => "storageUriRenewalFailed",
            UploadState::StorageUriRenewalTimedOut => "storageUriRenewalTimedOut",
            UploadState::CommitFileSuccess => "commitFileSuccess",
            UploadState::CommitFilePending => "commitFilePending",
            UploadState::CommitFileFailed => "commitFileFailed",
            UploadState::CommitFileTimedOut => "commitFileTimedOut",
            UploadState::Success => "success",
            UploadState::TransientError => "transientError",
            UploadState::Error => "error",
            UploadState::Unknown => "unknown",
            UploadState::Unrecognized => "unrecognized",
        };
        f.write_str(s)
    }
}

/// File descriptor registered inside a content version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileManifest {
    /// Installer file name
    pub name: String,
    /// Plaintext size in bytes
    pub size: u64,
    /// Encrypted size in bytes
    pub size_encrypted: u64,
}

/// Snapshot of a content file as reported by `get_content_file`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentFileStatus {
    pub id: ContentFileId,
    /// Absent while the service has not evaluated the file yet; treated
    /// as a pending state by the poll loops.
    #[serde(default)]
    pub upload_state: Option<UploadState>,
    /// Pre-signed, write-capable object-storage URI. Present once the
    /// state reaches a storage-URI-ready value.
    #[serde(default)]
    pub storage_uri: Option<String>,
}

impl ContentFileStatus {
    /// The reported state, with an absent field mapped to `Unknown`.
    pub fn state(&self) -> UploadState {
        self.upload_state.unwrap_or(UploadState::Unknown)
    }
}

/// Specification of the parent application resource to create.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSpec {
    pub display_name: String,
    pub publisher: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Installer file name as shown to administrators
    pub file_name: String,
}

/// Final update recording the committed content version on the parent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommittedVersion {
    pub committed_content_version: ContentVersionId,
}

/// Encryption metadata as the commit request carries it: key material and
/// digests base64-encoded, camelCase field names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEncryptionInfo {
    pub encryption_key: String,
    pub mac_key: String,
    pub initialization_vector: String,
    pub mac: String,
    pub profile_identifier: String,
    pub file_digest: String,
    pub file_digest_algorithm: String,
}

impl FileEncryptionInfo {
    /// Encode domain metadata into its wire form.
    pub fn from_metadata(meta: &EncryptionMetadata) -> Self {
        Self {
            encryption_key: BASE64.encode(&meta.encryption_key),
            mac_key: BASE64.encode(&meta.mac_key),
            initialization_vector: BASE64.encode(&meta.initialization_vector),
            mac: BASE64.encode(&meta.mac),
            profile_identifier: meta.profile_identifier.clone(),
            file_digest: BASE64.encode(&meta.file_digest),
            file_digest_algorithm: meta.file_digest_algorithm.clone(),
        }
    }
}

/// Body of the commit request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRequest {
    pub file_encryption_info: FileEncryptionInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_state_wire_names() {
        let s: UploadState = serde_json::from_str("\"commitFileSuccess\"").unwrap();
        assert_eq!(s, UploadState::CommitFileSuccess);
        let s: UploadState = serde_json::from_str("\"storageUriRenewalTimedOut\"").unwrap();
        assert_eq!(s, UploadState::StorageUriRenewalTimedOut);
        assert_eq!(
            serde_json::to_string(&UploadState::TransientError).unwrap(),
            "\"transientError\""
        );
    }

    #[test]
    fn test_unknown_state_maps_to_unrecognized() {
        let s: UploadState = serde_json::from_str("\"someFutureState\"").unwrap();
        assert_eq!(s, UploadState::Unrecognized);
    }

    #[test]
    fn test_absent_state_reads_as_unknown() {
        let status: ContentFileStatus =
            serde_json::from_str(r#"{"id": "file-1"}"#).unwrap();
        assert_eq!(status.state(), UploadState::Unknown);
        assert!(status.storage_uri.is_none());
    }

    #[test]
    fn test_status_with_uri() {
        let status: ContentFileStatus = serde_json::from_str(
            r#"{
                "id": "file-1",
                "uploadState": "storageUriRequestSuccess",
                "storageUri": "https://storage.example.com/c?sig=abc"
            }"#,
        )
        .unwrap();
        assert_eq!(status.state(), UploadState::StorageUriRequestSuccess);
        assert_eq!(
            status.storage_uri.as_deref(),
            Some("https://storage.example.com/c?sig=abc")
        );
    }

    #[test]
    fn test_encryption_info_base64_round_trip() {
        use crate::encrypt::{EncryptionMetadata, FILE_DIGEST_ALGORITHM, PROFILE_VERSION_1};

        let meta = EncryptionMetadata {
            encryption_key: vec![1; 32],
            mac_key: vec![2; 32],
            initialization_vector: vec![3; 16],
            mac: vec![4; 32],
            file_digest: vec![5; 32],
            profile_identifier: PROFILE_VERSION_1.to_string(),
            file_digest_algorithm: FILE_DIGEST_ALGORITHM.to_string(),
            size: 10,
            size_encrypted: 64,
        };
        let info = FileEncryptionInfo::from_metadata(&meta);
        assert_eq!(BASE64.decode(&info.encryption_key).unwrap(), vec![1; 32]);
        assert_eq!(BASE64.decode(&info.initialization_vector).unwrap(), vec![3; 16]);
        assert_eq!(info.profile_identifier, "ProfileVersion1");

        let body = serde_json::to_value(CommitRequest {
            file_encryption_info: info,
        })
        .unwrap();
        assert!(body["fileEncryptionInfo"]["macKey"].is_string());
    }
}
