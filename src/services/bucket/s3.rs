//! S3 bucket implementation using OpenDAL.
//!
//! Supports Amazon S3 and S3-compatible services (MinIO, Cloudflare R2,
//! DigitalOcean Spaces) through a custom endpoint.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use opendal::layers::LoggingLayer;
use opendal::services::S3;
use opendal::{EntryMode, ErrorKind, Operator};

use super::location::{as_folder, ObjectLocation};
use super::traits::{BoxedBucketAccess, BucketAccess};
use super::types::{BackendType, StorageConfig};
use crate::error::{Result, TransferError};

/// Bucket handle backed by a live S3 client.
///
/// Uses OpenDAL for all S3 operations. The operator is cheap to clone, so
/// scoped views share it.
#[derive(Clone)]
pub struct S3Bucket {
    operator: Operator,
    location: ObjectLocation,
    region: String,
}

impl std::fmt::Debug for S3Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Bucket")
            .field("location", &self.location)
            .field("region", &self.region)
            .field("operator", &"<Operator>")
            .finish()
    }
}

impl S3Bucket {
    /// Open a handle on `location`.
    ///
    /// Fails with `MissingCredentials` before any client is built if the key
    /// pair is incomplete. No request is sent until an operation runs.
    pub fn new(config: &StorageConfig, location: ObjectLocation) -> Result<Self> {
        config.validate()?;
        location.canonical_url()?;

        let operator = Self::build_operator(config, location.bucket())?;
        Ok(Self {
            operator,
            location,
            region: config.region.clone(),
        })
    }

    /// Create a boxed handle.
    pub fn boxed(config: &StorageConfig, location: ObjectLocation) -> Result<BoxedBucketAccess> {
        Ok(Box::new(Self::new(config, location)?))
    }

    /// Build the OpenDAL operator.
    fn build_operator(config: &StorageConfig, bucket: &str) -> Result<Operator> {
        let mut builder = S3::default()
            .bucket(bucket)
            .region(&config.region)
            .access_key_id(&config.credentials.access_key_id)
            .secret_access_key(&config.credentials.secret_access_key);

        // Custom endpoint for S3-compatible services
        if let Some(ep) = config.endpoint.as_deref() {
            if !ep.is_empty() {
                builder = builder.endpoint(ep);
            }
        }

        if !config.path_style {
            builder = builder.enable_virtual_host_style();
        }

        let op = Operator::new(builder)?
            .layer(LoggingLayer::default())
            .finish();

        Ok(op)
    }

    fn key(&self, key: &str) -> String {
        self.location.object_key(key)
    }

    /// Folder path for listing; OpenDAL names the bucket root "/".
    fn folder(&self, prefix: &str) -> String {
        let folder = as_folder(&self.location.object_key(prefix));
        if folder.is_empty() {
            "/".to_string()
        } else {
            folder
        }
    }

    fn map_error(&self, err: opendal::Error) -> TransferError {
        match err.kind() {
            ErrorKind::PermissionDenied => TransferError::AccessDenied(err.to_string()),
            _ => TransferError::Storage(err),
        }
    }

    /// Listing is the first call that reaches the bucket, so a 404 there means
    /// the bucket itself is missing.
    fn map_list_error(&self, err: opendal::Error) -> TransferError {
        match err.kind() {
            ErrorKind::NotFound => TransferError::BucketNotFound {
                bucket: self.location.bucket().to_string(),
            },
            _ => self.map_error(err),
        }
    }

    /// Entries directly under `folder`, with paths relative to the folder.
    async fn list_children(&self, prefix: &str) -> Result<Vec<(String, bool)>> {
        let folder = self.folder(prefix);
        let entries = self
            .operator
            .list_with(&folder)
            .await
            .map_err(|e| self.map_list_error(e))?;

        let strip = if folder == "/" { "" } else { folder.as_str() };
        Ok(entries
            .into_iter()
            .filter_map(|entry| {
                let is_dir = entry.metadata().mode() == EntryMode::DIR;
                let rest = entry.path().strip_prefix(strip)?.trim_start_matches('/');
                // Skip the folder marker itself
                if rest.is_empty() {
                    None
                } else {
                    Some((rest.to_string(), is_dir))
                }
            })
            .collect())
    }
}

#[async_trait]
impl BucketAccess for S3Bucket {
    fn backend_type(&self) -> BackendType {
        BackendType::S3
    }

    fn location(&self) -> &ObjectLocation {
        &self.location
    }

    fn region(&self) -> &str {
        &self.region
    }

    fn scoped(&self, sub_path: &str) -> BoxedBucketAccess {
        Box::new(Self {
            operator: self.operator.clone(),
            location: self.location.child(sub_path),
            region: self.region.clone(),
        })
    }

    async fn list_prefixes(&self, prefix: &str) -> Result<BTreeSet<String>> {
        Ok(self
            .list_children(prefix)
            .await?
            .into_iter()
            .filter(|(_, is_dir)| *is_dir)
            .map(|(name, _)| as_folder(&name))
            .collect())
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .list_children(prefix)
            .await?
            .into_iter()
            .filter(|(_, is_dir)| !*is_dir)
            .map(|(name, _)| name)
            .collect())
    }

    async fn find_objects(&self, prefix: &str) -> Result<Vec<String>> {
        let full_prefix = self.key(prefix);
        let root = match full_prefix.rfind('/') {
            Some(idx) => full_prefix[..=idx].to_string(),
            None => "/".to_string(),
        };

        let entries = self
            .operator
            .list_with(&root)
            .recursive(true)
            .await
            .map_err(|e| self.map_list_error(e))?;

        Ok(entries
            .into_iter()
            .filter(|entry| entry.metadata().mode() == EntryMode::FILE)
            .map(|entry| entry.path().trim_start_matches('/').to_string())
            .filter(|path| path.starts_with(&full_prefix))
            .collect())
    }

    async fn read(&self, key: &str) -> Result<Bytes> {
        let buffer = self
            .operator
            .read(&self.key(key))
            .await
            .map_err(|e| self.map_error(e))?;
        Ok(buffer.to_bytes())
    }

    async fn read_stream(&self, key: &str) -> Result<BoxStream<'static, Result<Bytes>>> {
        let reader = self
            .operator
            .reader(&self.key(key))
            .await
            .map_err(|e| self.map_error(e))?;
        let stream = reader
            .into_bytes_stream(..)
            .await
            .map_err(|e| self.map_error(e))?
            .map(|chunk| chunk.map_err(TransferError::from));

        Ok(Box::pin(stream))
    }

    async fn write(&self, key: &str, data: Bytes, content_type: Option<&str>) -> Result<()> {
        let key = self.key(key);
        tracing::debug!(bucket = %self.location.bucket(), %key, size = data.len(), "s3 put");

        let mut request = self.operator.write_with(&key, data);
        if let Some(content_type) = content_type {
            request = request.content_type(content_type);
        }
        request.await.map_err(|e| self.map_error(e))?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.operator
            .exists(&self.key(key))
            .await
            .map_err(|e| self.map_error(e))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.operator
            .delete(&self.key(key))
            .await
            .map_err(|e| self.map_error(e))
    }

    async fn rename(&self, old_key: &str, new_key: &str) -> Result<()> {
        let from = self.key(old_key);
        let to = self.key(new_key);
        tracing::debug!(bucket = %self.location.bucket(), %from, %to, "s3 move");

        // S3 has no native rename
        self.operator
            .copy(&from, &to)
            .await
            .map_err(|e| self.map_error(e))?;
        self.operator
            .delete(&from)
            .await
            .map_err(|e| self.map_error(e))
    }

    async fn signed_link(&self, prefix: &str, key: &str, ttl: Duration) -> Result<String> {
        let key = self.key(&format!("{}{}", prefix, key));
        let request = self
            .operator
            .presign_read(&key, ttl)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::ConfigInvalid | ErrorKind::PermissionDenied => {
                    TransferError::AccessDenied(e.to_string())
                }
                _ => TransferError::Storage(e),
            })?;

        Ok(request.uri().to_string())
    }
}
