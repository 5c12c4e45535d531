// src/upload/registrar.rs

//! Content version and content file registration
//!
//! Opening a content version is a single remote call with no local retry:
//! without a version container nothing downstream can proceed, so failure
//! is fatal. File registration is followed by a poll loop that waits for
//! the service to allocate a write-capable storage URI, sleeping with the
//! shared backoff discipline under the caller's deadline.

use crate::deadline::Deadline;
use crate::error::{Error, Result};
use crate::remote::types::{
    ContentFileId, ContentVersionId, FileManifest, ResourceId, UploadState,
};
use crate::remote::RemoteService;
use crate::upload::backoff::Backoff;
use rand::Rng;
use tracing::{debug, info};

/// A registered content file with its allocated storage URI.
#[derive(Debug, Clone)]
pub struct AllocatedFile {
    pub id: ContentFileId,
    pub storage_uri: String,
}

/// Open a new content-version container on the parent resource.
pub fn open_content_version<S: RemoteService>(
    remote: &S,
    deadline: &Deadline,
    resource: &ResourceId,
) -> Result<ContentVersionId> {
    deadline.check()?;
    let version = remote.open_content_version(resource)?;
    info!("Content version {} opened on {}", version, resource);
    Ok(version)
}

/// Register file metadata and poll until the service allocates a storage
/// URI for it.
///
/// Failed or timed-out allocation states are fatal
/// ([`Error::StorageAllocation`]); pending, renewal, unknown, and
/// unrecognized states keep the loop polling until the deadline expires.
pub fn register_content_file<S: RemoteService, R: Rng>(
    remote: &S,
    deadline: &Deadline,
    mut backoff: Backoff<R>,
    resource: &ResourceId,
    version: &ContentVersionId,
    manifest: &FileManifest,
) -> Result<AllocatedFile> {
    deadline.check()?;
    let file = remote.register_content_file(resource, version, manifest)?;
    info!(
        "Registered content file {} ({} bytes plaintext, {} encrypted)",
        file, manifest.size, manifest.size_encrypted
    );

    loop {
        deadline.check()?;
        let status = remote.get_content_file(resource, version, &file)?;
        let state = status.state();
        debug!("Content file {} state: {}", file, state);

        match state {
            UploadState::StorageUriRequestSuccess | UploadState::StorageUriRenewalSuccess => {
                let uri = status.storage_uri.ok_or_else(|| {
                    Error::remote(
                        "getContentFile",
                        format!("state {state} reported without a storage URI"),
                    )
                })?;
                info!("Storage URI allocated for content file {}", file);
                return Ok(AllocatedFile {
                    id: file,
                    storage_uri: uri,
                });
            }
            UploadState::StorageUriRequestFailed
            | UploadState::StorageUriRequestTimedOut
            | UploadState::StorageUriRenewalFailed
            | UploadState::StorageUriRenewalTimedOut => {
                return Err(Error::StorageAllocation { state });
            }
            // Pending, unknown, and anything this client does not
            // recognize: the allocation may still land.
            _ => {}
        }

        deadline.sleep(backoff.next_delay())?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::types::{
        CommitRequest, CommittedVersion, ContentFileStatus, ResourceSpec,
    };
    use crate::upload::backoff::BackoffConfig;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Remote stub that serves a scripted sequence of upload states.
    struct ScriptedRemote {
        states: Mutex<Vec<(UploadState, Option<String>)>>,
        commits: Mutex<u32>,
    }

    impl ScriptedRemote {
        fn new(states: Vec<(UploadState, Option<String>)>) -> Self {
            Self {
                states: Mutex::new(states),
                commits: Mutex::new(0),
            }
        }
    }

    impl RemoteService for ScriptedRemote {
        fn create_parent_resource(&self, _spec: &ResourceSpec) -> Result<ResourceId> {
            Ok(ResourceId("res-1".into()))
        }

        fn open_content_version(&self, _resource: &ResourceId) -> Result<ContentVersionId> {
            Ok(ContentVersionId("v-1".into()))
        }

        fn register_content_file(
            &self,
            _resource: &ResourceId,
            _version: &ContentVersionId,
            _manifest: &FileManifest,
        ) -> Result<ContentFileId> {
            Ok(ContentFileId("f-1".into()))
        }

        fn get_content_file(
            &self,
            _resource: &ResourceId,
            _version: &ContentVersionId,
            file: &ContentFileId,
        ) -> Result<ContentFileStatus> {
            let mut states = self.states.lock().unwrap();
            assert!(!states.is_empty(), "poll past end of scripted states");
            let (state, uri) = states.remove(0);
            Ok(ContentFileStatus {
                id: file.clone(),
                upload_state: Some(state),
                storage_uri: uri,
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
            _committed: &CommittedVersion,
        ) -> Result<()> {
            Ok(())
        }
    }

    fn fast_backoff() -> Backoff<StdRng> {
        Backoff::new(
            BackoffConfig {
                initial: Duration::from_millis(1),
                factor: 1.5,
                max: Duration::from_millis(5),
                jitter_fraction: 0.0,
            },
            StdRng::seed_from_u64(1),
        )
    }

    fn manifest() -> FileManifest {
        FileManifest {
            name: "installer.pkg".into(),
            size: 100,
            size_encrypted: 160,
        }
    }

    #[test]
    fn test_allocation_after_pending_states() {
        let remote = ScriptedRemote::new(vec![
            (UploadState::StorageUriRequestPending, None),
            (UploadState::Unknown, None),
            (
                UploadState::StorageUriRequestSuccess,
                Some("https://storage.example.com/b?sig=1".into()),
            ),
        ]);
        let deadline = Deadline::from_timeout(Duration::from_secs(10));
        let allocated = register_content_file(
            &remote,
            &deadline,
            fast_backoff(),
            &ResourceId("res-1".into()),
            &ContentVersionId("v-1".into()),
            &manifest(),
        )
        .unwrap();
        assert_eq!(allocated.id, ContentFileId("f-1".into()));
        assert_eq!(allocated.storage_uri, "https://storage.example.com/b?sig=1");
    }

    #[test]
    fn test_allocation_failure_is_fatal_and_no_commit_attempted() {
        let remote = ScriptedRemote::new(vec![
            (UploadState::StorageUriRequestPending, None),
            (UploadState::StorageUriRequestFailed, None),
        ]);
        let deadline = Deadline::from_timeout(Duration::from_secs(10));
        let err = register_content_file(
            &remote,
            &deadline,
            fast_backoff(),
            &ResourceId("res-1".into()),
            &ContentVersionId("v-1".into()),
            &manifest(),
        )
        .unwrap_err();
        match err {
            Error::StorageAllocation { state } => {
                assert_eq!(state, UploadState::StorageUriRequestFailed)
            }
            other => panic!("expected StorageAllocation, got {other:?}"),
        }
        assert_eq!(*remote.commits.lock().unwrap(), 0);
    }

    #[test]
    fn test_renewal_timeout_is_fatal() {
        let remote =
            ScriptedRemote::new(vec![(UploadState::StorageUriRenewalTimedOut, None)]);
        let deadline = Deadline::from_timeout(Duration::from_secs(10));
        let err = register_content_file(
            &remote,
            &deadline,
            fast_backoff(),
            &ResourceId("res-1".into()),
            &ContentVersionId("v-1".into()),
            &manifest(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::StorageAllocation { .. }));
    }

    #[test]
    fn test_ready_state_without_uri_is_remote_error() {
        let remote =
            ScriptedRemote::new(vec![(UploadState::StorageUriRequestSuccess, None)]);
        let deadline = Deadline::from_timeout(Duration::from_secs(10));
        let err = register_content_file(
            &remote,
            &deadline,
            fast_backoff(),
            &ResourceId("res-1".into()),
            &ContentVersionId("v-1".into()),
            &manifest(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Remote { .. }));
    }

    #[test]
    fn test_deadline_expiry_stops_polling() {
        // Endless pending states; the deadline has to cut the loop.
        let remote = ScriptedRemote::new(vec![
            (UploadState::StorageUriRequestPending, None);
            64
        ]);
        let deadline = Deadline::from_timeout(Duration::from_millis(20));
        let err = register_content_file(
            &remote,
            &deadline,
            fast_backoff(),
            &ResourceId("res-1".into()),
            &ContentVersionId("v-1".into()),
            &manifest(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::DeadlineExceeded { .. }));
    }
}
