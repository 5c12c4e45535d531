// src/upload/commit.rs

//! Commit coordination state machine
//!
//! After the ciphertext lands in object storage, the service must be told
//! to finalize it: submit the encryption metadata as a commit request,
//! then poll the content file until the service reports it fully
//! processed. Failed or timed-out commit states are recovered by
//! resubmitting the commit request inside the same bounded loop; storage
//! allocation failures and hard errors abort immediately.
//!
//! The per-state decision is a pure function ([`CommitAction::for_state`])
//! so the state table is testable without any network plumbing.

use crate::deadline::Deadline;
use crate::encrypt::EncryptionMetadata;
use crate::error::{Error, Result};
use crate::remote::types::{
    CommitRequest, ContentFileId, ContentVersionId, FileEncryptionInfo, ResourceId, UploadState,
};
use crate::remote::RemoteService;
use crate::upload::backoff::{Backoff, BackoffConfig};
use rand::Rng;
use tracing::{debug, info, warn};

/// Tuning for the commit poll loop. Explicit configuration rather than
/// module globals; defaults match the service's observed processing times.
#[derive(Debug, Clone)]
pub struct CommitConfig {
    /// Maximum poll attempts before giving up
    pub max_retries: u32,
    /// Inter-poll backoff (1s base, 1.5x growth, 30s cap, jittered)
    pub backoff: BackoffConfig,
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            max_retries: 20,
            backoff: BackoffConfig::default(),
        }
    }
}

/// What one observed upload state means for the commit loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitAction {
    /// Terminal success; stop polling.
    Succeed,
    /// Still in flight; poll again.
    Continue,
    /// The commit attempt was lost or not yet made; resubmit, then poll.
    Resubmit,
    /// Unrecoverable; abort the pipeline.
    Fail,
}

impl CommitAction {
    /// The commit state table.
    ///
    /// Unrecognized values continue polling: a state this client does not
    /// know must not abort a commit that may still land.
    pub fn for_state(state: UploadState) -> Self {
        match state {
            UploadState::CommitFileSuccess => CommitAction::Succeed,

            UploadState::CommitFilePending
            | UploadState::Success
            | UploadState::TransientError
            | UploadState::Unknown
            | UploadState::StorageUriRequestPending
            | UploadState::StorageUriRenewalPending
            | UploadState::Unrecognized => CommitAction::Continue,

            UploadState::CommitFileFailed
            | UploadState::CommitFileTimedOut
            | UploadState::StorageUriRequestSuccess
            | UploadState::StorageUriRenewalSuccess => CommitAction::Resubmit,

            UploadState::Error
            | UploadState::StorageUriRequestFailed
            | UploadState::StorageUriRequestTimedOut
            | UploadState::StorageUriRenewalFailed
            | UploadState::StorageUriRenewalTimedOut => CommitAction::Fail,
        }
    }
}

/// Drives a registered, uploaded content file to its committed state.
pub struct CommitCoordinator {
    config: CommitConfig,
}

impl CommitCoordinator {
    pub fn new(config: CommitConfig) -> Self {
        Self { config }
    }

    /// Submit the commit request and poll until the service confirms it.
    ///
    /// The loop is bounded both by `max_retries` and by the deadline;
    /// whichever is hit first terminates it. Resubmission failures are
    /// logged and polling continues, since the next poll may still reveal
    /// progress from an earlier submission.
    pub fn run<S: RemoteService, R: Rng>(
        &self,
        remote: &S,
        deadline: &Deadline,
        rng: R,
        resource: &ResourceId,
        version: &ContentVersionId,
        file: &ContentFileId,
        metadata: &EncryptionMetadata,
    ) -> Result<()> {
        let request = CommitRequest {
            file_encryption_info: FileEncryptionInfo::from_metadata(metadata),
        };

        deadline.check()?;
        remote.commit_content_file(resource, version, file, &request)?;
        info!("Commit request submitted for content file {}", file);

        let mut backoff = Backoff::new(self.config.backoff.clone(), rng);
        let mut last_state = UploadState::Unknown;

        for attempt in 1..=self.config.max_retries {
            deadline.sleep(backoff.next_delay())?;
            deadline.check()?;

            let status = remote.get_content_file(resource, version, file)?;
            last_state = status.state();
            debug!(
                "Commit poll {}/{}: state {}",
                attempt, self.config.max_retries, last_state
            );

            match CommitAction::for_state(last_state) {
                CommitAction::Succeed => {
                    info!("Content file {} committed after {} polls", file, attempt);
                    return Ok(());
                }
                CommitAction::Continue => {}
                CommitAction::Resubmit => {
                    debug!("State {} calls for a commit resubmission", last_state);
                    if let Err(e) = remote.commit_content_file(resource, version, file, &request)
                    {
                        // Keep polling; an earlier submission may still land.
                        warn!("Commit resubmission failed: {}", e);
                    }
                }
                CommitAction::Fail => {
                    return Err(match last_state {
                        UploadState::StorageUriRequestFailed
                        | UploadState::StorageUriRequestTimedOut
                        | UploadState::StorageUriRenewalFailed
                        | UploadState::StorageUriRenewalTimedOut => {
                            Error::StorageAllocation { state: last_state }
                        }
                        _ => Error::remote(
                            "commitContentFile",
                            format!("remote reported terminal state {last_state}"),
                        ),
                    });
                }
            }
        }

        Err(Error::CommitTimeout {
            attempts: self.config.max_retries,
            last_state,
        })
    }
}
