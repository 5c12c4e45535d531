// src/config.rs

//! Configuration file parsing for packlift
//!
//! Supports TOML configuration files with the following sections:
//! - [service] - API endpoint and credentials
//! - [upload] - Deadline and poll-loop tuning
//!
//! Every tuning field has a default matching the pipeline's built-in
//! behavior, so a minimal config only needs the endpoint and token.

use crate::error::{Error, Result};
use crate::remote::RemoteEndpoint;
use crate::upload::backoff::BackoffConfig;
use crate::upload::commit::CommitConfig;
use crate::upload::orchestrator::PublishOptions;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct PackliftConfig {
    #[serde(default)]
    pub service: ServiceSection,

    #[serde(default)]
    pub upload: UploadSection,
}

/// [service] section
#[derive(Debug, Deserialize, Default)]
pub struct ServiceSection {
    /// Base URL of the device-management API
    pub endpoint: Option<String>,
    /// Bearer token; prefer `token_env` so the secret stays out of the file
    pub token: Option<String>,
    /// Environment variable holding the bearer token
    pub token_env: Option<String>,
}

/// [upload] section
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct UploadSection {
    /// Overall publish budget in seconds
    pub timeout_secs: u64,
    /// Held back from the budget for finalization
    pub safety_margin_secs: u64,
    /// Commit poll attempt ceiling
    pub max_commit_retries: u32,
    /// First backoff delay in milliseconds
    pub initial_backoff_ms: u64,
    /// Backoff growth factor
    pub backoff_factor: f64,
    /// Backoff cap in milliseconds
    pub max_backoff_ms: u64,
    /// Jitter as a fraction of the current backoff
    pub jitter_fraction: f64,
}

impl Default for UploadSection {
    fn default() -> Self {
        let commit = CommitConfig::default();
        Self {
            timeout_secs: 1800,
            safety_margin_secs: 30,
            max_commit_retries: commit.max_retries,
            initial_backoff_ms: commit.backoff.initial.as_millis() as u64,
            backoff_factor: commit.backoff.factor,
            max_backoff_ms: commit.backoff.max.as_millis() as u64,
            jitter_fraction: commit.backoff.jitter_fraction,
        }
    }
}

impl PackliftConfig {
    /// Load a configuration file, or defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {e}", path.display())))
    }

    /// Endpoint and credentials, with CLI overrides taking precedence.
    pub fn endpoint(
        &self,
        endpoint_override: Option<&str>,
        token_override: Option<&str>,
    ) -> Result<RemoteEndpoint> {
        let raw = endpoint_override
            .map(str::to_string)
            .or_else(|| self.service.endpoint.clone())
            .ok_or_else(|| {
                Error::Config("No service endpoint configured (set [service].endpoint)".into())
            })?;
        let base_url = Url::parse(&raw)
            .map_err(|e| Error::Config(format!("Invalid endpoint {raw}: {e}")))?;

        let token = token_override
            .map(str::to_string)
            .or_else(|| self.service.token.clone())
            .or_else(|| {
                self.service
                    .token_env
                    .as_deref()
                    .and_then(|var| std::env::var(var).ok())
            })
            .ok_or_else(|| {
                Error::Config(
                    "No token configured (set [service].token or [service].token_env)".into(),
                )
            })?;

        Ok(RemoteEndpoint { base_url, token })
    }

    /// Publish tuning derived from the [upload] section.
    pub fn publish_options(&self) -> PublishOptions {
        let backoff = BackoffConfig {
            initial: Duration::from_millis(self.upload.initial_backoff_ms),
            factor: self.upload.backoff_factor,
            max: Duration::from_millis(self.upload.max_backoff_ms),
            jitter_fraction: self.upload.jitter_fraction,
        };
        PublishOptions {
            timeout: Duration::from_secs(self.upload.timeout_secs),
            safety_margin: Duration::from_secs(self.upload.safety_margin_secs),
            commit: CommitConfig {
                max_retries: self.upload.max_commit_retries,
                backoff: backoff.clone(),
            },
            poll: backoff,
        }
    }
}
