// tests/common/mod.rs
//! Scripted in-memory doubles for the remote service and object storage.

use packlift::remote::types::{
    CommitRequest, CommittedVersion, ContentFileId, ContentFileStatus, ContentVersionId,
    FileManifest, ResourceId, ResourceSpec, UploadState,
};
use packlift::{Deadline, Error, ObjectStore, RemoteService, Result};
use std::path::Path;
use std::sync::Mutex;

pub const STORAGE_URI: &str = "https://storage.example.com/container/blob?sig=test";

/// Remote service double replaying a scripted `get_content_file` state
/// sequence and recording every call for assertions.
#[derive(Default)]
pub struct MockRemote {
    /// States served in order; with each `StorageUriRequestSuccess` or
    /// `StorageUriRenewalSuccess` the storage URI is attached.
    states: Mutex<Vec<UploadState>>,
    pub polls: Mutex<u32>,
    pub commits: Mutex<u32>,
    pub registered: Mutex<Vec<FileManifest>>,
    pub updates: Mutex<Vec<CommittedVersion>>,
    pub fail_open_version: bool,
}

impl MockRemote {
    pub fn with_states(states: Vec<UploadState>) -> Self {
        Self {
            states: Mutex::new(states),
            ..Default::default()
        }
    }

    pub fn failing_open_version() -> Self {
        Self {
            fail_open_version: true,
            ..Default::default()
        }
    }

    pub fn polls(&self) -> u32 {
        *self.polls.lock().unwrap()
    }

    pub fn commits(&self) -> u32 {
        *self.commits.lock().unwrap()
    }
}

impl RemoteService for MockRemote {
    fn create_parent_resource(&self, _spec: &ResourceSpec) -> Result<ResourceId> {
        Ok(ResourceId("res-1".into()))
    }

    fn open_content_version(&self, _resource: &ResourceId) -> Result<ContentVersionId> {
        if self.fail_open_version {
            return Err(Error::remote("openContentVersion", "HTTP 500"));
        }
        Ok(ContentVersionId("v-1".into()))
    }

    fn register_content_file(
        &self,
        _resource: &ResourceId,
        _version: &ContentVersionId,
        manifest: &FileManifest,
    ) -> Result<ContentFileId> {
        self.registered.lock().unwrap().push(manifest.clone());
        Ok(ContentFileId("f-1".into()))
    }

    fn get_content_file(
        &self,
        _resource: &ResourceId,
        _version: &ContentVersionId,
        file: &ContentFileId,
    ) -> Result<ContentFileStatus> {
        *self.polls.lock().unwrap() += 1;
        let mut states = self.states.lock().unwrap();
        let state = if states.is_empty() {
            UploadState::CommitFilePending
        } else {
            states.remove(0)
        };
        let storage_uri = matches!(
            state,
            UploadState::StorageUriRequestSuccess | UploadState::StorageUriRenewalSuccess
        )
        .then(|| STORAGE_URI.to_string());
        Ok(ContentFileStatus {
            id: file.clone(),
            upload_state: Some(state),
            storage_uri,
        })
    }

    fn commit_content_file(
        &self,
        _resource: &ResourceId,
        _version: &ContentVersionId,
        _file: &ContentFileId,
        _request: &CommitRequest,
    ) -> Result<()> {
        *self.commits.lock().unwrap() += 1;
        Ok(())
    }

    fn update_parent_resource(
        &self,
        _resource: &ResourceId,
        committed: &CommittedVersion,
    ) -> Result<()> {
        self.updates.lock().unwrap().push(committed.clone());
        Ok(())
    }
}

/// Object-storage double recording transfers, optionally failing them.
#[derive(Default)]
pub struct MockStore {
    pub uploads: Mutex<Vec<(String, u64)>>,
    pub fail: bool,
}

impl MockStore {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn uploads(&self) -> Vec<(String, u64)> {
        self.uploads.lock().unwrap().clone()
    }
}

impl ObjectStore for MockStore {
    fn put_object(&self, uri: &str, local_path: &Path, deadline: &Deadline) -> Result<()> {
        deadline.check()?;
        if self.fail {
            return Err(Error::Upload("connection reset by peer".into()));
        }
        let len = std::fs::metadata(local_path)
            .map_err(|e| Error::Upload(e.to_string()))?
            .len();
        self.uploads.lock().unwrap().push((uri.to_string(), len));
        Ok(())
    }
}
