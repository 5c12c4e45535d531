// src/upload/mod.rs

//! Encrypted package upload and commit pipeline
//!
//! The stages run strictly in sequence; each stage's output is the next
//! stage's precondition:
//!
//! 1. Encrypt the installer ([`crate::encrypt`])
//! 2. Open a content version ([`registrar`])
//! 3. Register the file and wait for its storage URI ([`registrar`])
//! 4. Upload the ciphertext ([`storage`])
//! 5. Drive the commit state machine ([`commit`])
//!
//! [`orchestrator`] sequences 1-5 under one deadline and guarantees
//! temp-file cleanup on every exit path.

pub mod backoff;
pub mod cleanup;
pub mod commit;
pub mod orchestrator;
pub mod registrar;
pub mod storage;

pub use backoff::{Backoff, BackoffConfig};
pub use cleanup::CleanupGuard;
pub use commit::{CommitAction, CommitConfig, CommitCoordinator};
pub use orchestrator::{
    publish_package, PackageSource, PublishOptions, PublishOutcome, PublishRequest,
};
pub use registrar::{open_content_version, register_content_file, AllocatedFile};
pub use storage::upload_ciphertext;
