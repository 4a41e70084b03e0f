//! Bucket backend types and configuration.
//!
//! This module defines the backend kinds a bucket handle can be built on,
//! the credentials every backend requires, and the per-bucket configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TransferError};

/// Supported bucket backend types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// Amazon S3 and S3-compatible services
    S3,
    /// In-process store for tests
    Memory,
}

impl BackendType {
    /// Get the display name for this backend type.
    pub fn display_name(&self) -> &'static str {
        match self {
            BackendType::S3 => "Amazon S3",
            BackendType::Memory => "In-memory store",
        }
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Access key pair used to sign store requests.
///
/// The secret is read from configuration but never written back out.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    pub access_key_id: String,
    #[serde(skip_serializing, default)]
    pub secret_access_key: String,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }

    /// Fail with `MissingCredentials` unless both halves of the key pair are present.
    pub fn validate(&self) -> Result<()> {
        if self.access_key_id.trim().is_empty() || self.secret_access_key.trim().is_empty() {
            return Err(TransferError::MissingCredentials);
        }
        Ok(())
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Configuration shared by every bucket opened through one store client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Access key pair.
    pub credentials: Credentials,
    /// Region identifier (e.g. "us-east-1"), passed to the warehouse on COPY.
    pub region: String,
    /// S3 endpoint URL (leave empty for AWS, set for MinIO/R2/etc.)
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Use path-style addressing (required for MinIO)
    #[serde(default)]
    pub path_style: bool,
}

impl StorageConfig {
    pub fn new(credentials: Credentials, region: impl Into<String>) -> Self {
        Self {
            credentials,
            region: region.into(),
            endpoint: None,
            path_style: false,
        }
    }

    /// Point the client at an S3-compatible endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>, path_style: bool) -> Self {
        self.endpoint = Some(endpoint.into());
        self.path_style = path_style;
        self
    }

    /// Validate the configuration before any store access.
    pub fn validate(&self) -> Result<()> {
        self.credentials.validate()
    }
}
