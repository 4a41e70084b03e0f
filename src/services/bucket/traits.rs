//! Bucket access traits.
//!
//! This module defines the capability set every bucket backend provides,
//! so the warehouse table engine can work against a live store or the
//! in-memory double without telling them apart.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use super::location::ObjectLocation;
use super::types::BackendType;
use crate::error::Result;

/// Core trait for bucket handles.
///
/// A handle owns exactly one [`ObjectLocation`] and a region. Every key and
/// prefix passed to its methods is relative to that location's path prefix,
/// and prefixes are `/`-delimited.
///
/// # Example
///
/// ```ignore
/// let bucket = gateway.bucket("example-bucket")?;
/// bucket.write("public/accounts/part-1.csv", data, Some("text/csv")).await?;
///
/// let folders = bucket.list_prefixes("public/").await?;
/// assert!(folders.contains("accounts/"));
/// ```
#[async_trait]
pub trait BucketAccess: Send + Sync {
    /// Get the backend type for this handle.
    fn backend_type(&self) -> BackendType;

    /// The location this handle is rooted at.
    fn location(&self) -> &ObjectLocation;

    /// Region identifier of the bucket.
    fn region(&self) -> &str;

    /// Canonical URL of the handle's location, usable as a COPY/UNLOAD target.
    fn url(&self) -> Result<String> {
        self.location().canonical_url()
    }

    /// A thin view over `sub_path` sharing this handle's backend and region.
    fn scoped(&self, sub_path: &str) -> BoxedBucketAccess;

    /// Immediate child prefixes one level below `prefix`, with `prefix` stripped.
    ///
    /// Over `{"a/b/c/x", "a/b/c/y", "a/b/d/z"}`, `list_prefixes("a/b/")`
    /// returns `{"c/", "d/"}`.
    async fn list_prefixes(&self, prefix: &str) -> Result<BTreeSet<String>>;

    /// Objects directly under `prefix`, with `prefix` stripped.
    ///
    /// The folder marker object for `prefix` itself is never returned.
    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>>;

    /// Every key starting with `prefix`, recursively and unstripped.
    async fn find_objects(&self, prefix: &str) -> Result<Vec<String>>;

    /// Read a whole object.
    async fn read(&self, key: &str) -> Result<Bytes>;

    /// Read an object as a stream of chunks.
    async fn read_stream(&self, key: &str) -> Result<BoxStream<'static, Result<Bytes>>>;

    /// Write a whole object.
    ///
    /// `content_type` is attached only when provided.
    async fn write(&self, key: &str, data: Bytes, content_type: Option<&str>) -> Result<()>;

    /// Check if an object exists.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Delete an object.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Move an object to a new key.
    async fn rename(&self, old_key: &str, new_key: &str) -> Result<()>;

    /// A URL that fetches `prefix + key` without credentials until `ttl` elapses.
    async fn signed_link(&self, prefix: &str, key: &str, ttl: Duration) -> Result<String>;

    /// Rename `key` to `key.ext` and return the new key.
    async fn with_extension(&self, key: &str, ext: &str) -> Result<String> {
        let new_key = format!("{}.{}", key, ext.trim_start_matches('.'));
        self.rename(key, &new_key).await?;
        Ok(new_key)
    }
}

/// A boxed bucket handle for dynamic dispatch.
pub type BoxedBucketAccess = Box<dyn BucketAccess>;

impl std::fmt::Debug for dyn BucketAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketAccess")
            .field("backend", &self.backend_type())
            .field("location", self.location())
            .field("region", &self.region())
            .finish()
    }
}
