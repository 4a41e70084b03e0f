//! In-memory bucket backend.
//!
//! `MemoryStore` is a caller-owned set of buckets. Clones share the same
//! backing data, so a store handed to both a [`MemoryBucket`] and the
//! in-memory warehouse lets a COPY read what a bucket wrote. Tests that
//! share one store must call [`MemoryStore::reset`] between cases.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_lock::RwLock;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};

use super::location::{as_folder, ObjectLocation};
use super::traits::{BoxedBucketAccess, BucketAccess};
use super::types::{BackendType, Credentials};
use crate::error::{Result, TransferError};

/// A stored object and the metadata attached when it was written.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: Option<String>,
}

type BucketMap = HashMap<String, BTreeMap<String, StoredObject>>;

/// Shared in-process object store keyed by bucket name.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    buckets: Arc<RwLock<BucketMap>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty bucket if it does not exist yet.
    pub async fn create_bucket(&self, bucket: &str) {
        let mut guard = self.buckets.write().await;
        guard.entry(bucket.to_string()).or_default();
    }

    /// Drop every bucket and object.
    pub async fn reset(&self) {
        self.buckets.write().await.clear();
    }

    pub async fn bucket_exists(&self, bucket: &str) -> bool {
        self.buckets.read().await.contains_key(bucket)
    }

    /// Number of objects in `bucket` (zero for a missing bucket).
    pub async fn object_count(&self, bucket: &str) -> usize {
        self.buckets
            .read()
            .await
            .get(bucket)
            .map(|objects| objects.len())
            .unwrap_or(0)
    }

    pub async fn contains(&self, bucket: &str, key: &str) -> bool {
        self.get(bucket, key).await.is_some()
    }

    /// Fetch an object by its key relative to the bucket root.
    pub async fn get(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.buckets
            .read()
            .await
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .cloned()
    }

    /// Content type attached to an object, if any.
    pub async fn content_type(&self, bucket: &str, key: &str) -> Option<String> {
        self.get(bucket, key).await.and_then(|obj| obj.content_type)
    }

    /// All keys in a bucket, in lexical order.
    pub async fn keys(&self, bucket: &str) -> Result<Vec<String>> {
        let guard = self.buckets.read().await;
        let objects = guard.get(bucket).ok_or_else(|| bucket_not_found(bucket))?;
        Ok(objects.keys().cloned().collect())
    }

    /// Store an object, replacing any previous content.
    pub async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Result<()> {
        let mut guard = self.buckets.write().await;
        let objects = guard
            .get_mut(bucket)
            .ok_or_else(|| bucket_not_found(bucket))?;
        objects.insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.map(str::to_string),
            },
        );
        Ok(())
    }

    async fn fetch(&self, bucket: &str, key: &str) -> Result<StoredObject> {
        let guard = self.buckets.read().await;
        let objects = guard.get(bucket).ok_or_else(|| bucket_not_found(bucket))?;
        objects.get(key).cloned().ok_or_else(|| object_not_found(key))
    }

    async fn remove(&self, bucket: &str, key: &str) -> Result<()> {
        let mut guard = self.buckets.write().await;
        let objects = guard
            .get_mut(bucket)
            .ok_or_else(|| bucket_not_found(bucket))?;
        objects.remove(key);
        Ok(())
    }

    /// Move an object under a single lock so no reader sees both or neither key.
    async fn transfer(&self, bucket: &str, old_key: &str, new_key: &str) -> Result<()> {
        let mut guard = self.buckets.write().await;
        let objects = guard
            .get_mut(bucket)
            .ok_or_else(|| bucket_not_found(bucket))?;
        let object = objects
            .remove(old_key)
            .ok_or_else(|| object_not_found(old_key))?;
        objects.insert(new_key.to_string(), object);
        Ok(())
    }
}

fn bucket_not_found(bucket: &str) -> TransferError {
    TransferError::BucketNotFound {
        bucket: bucket.to_string(),
    }
}

fn object_not_found(key: &str) -> TransferError {
    TransferError::Storage(opendal::Error::new(
        opendal::ErrorKind::NotFound,
        format!("object not found: {}", key),
    ))
}

/// Immediate child prefixes of `prefix` among `keys`, with `prefix` stripped.
pub(crate) fn child_prefixes<'a>(
    keys: impl IntoIterator<Item = &'a String>,
    prefix: &str,
) -> BTreeSet<String> {
    keys.into_iter()
        .filter_map(|key| key.strip_prefix(prefix))
        .filter_map(|rest| rest.find('/').map(|idx| rest[..=idx].to_string()))
        .collect()
}

/// Objects directly under `prefix` among `keys`, with `prefix` stripped.
pub(crate) fn child_objects<'a>(
    keys: impl IntoIterator<Item = &'a String>,
    prefix: &str,
) -> Vec<String> {
    keys.into_iter()
        .filter_map(|key| key.strip_prefix(prefix))
        .filter(|rest| !rest.is_empty() && !rest.contains('/'))
        .map(str::to_string)
        .collect()
}

/// Bucket handle over a [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct MemoryBucket {
    store: MemoryStore,
    location: ObjectLocation,
    region: String,
}

impl MemoryBucket {
    /// Open a handle on `location`.
    ///
    /// Credentials are checked before the store is touched; the bucket
    /// itself is only looked up when an operation runs.
    pub fn new(
        store: MemoryStore,
        location: ObjectLocation,
        region: impl Into<String>,
        credentials: &Credentials,
    ) -> Result<Self> {
        credentials.validate()?;
        location.canonical_url()?;
        Ok(Self {
            store,
            location,
            region: region.into(),
        })
    }

    /// Create a boxed handle.
    pub fn boxed(
        store: MemoryStore,
        location: ObjectLocation,
        region: impl Into<String>,
        credentials: &Credentials,
    ) -> Result<BoxedBucketAccess> {
        Ok(Box::new(Self::new(store, location, region, credentials)?))
    }

    fn bucket(&self) -> &str {
        self.location.bucket()
    }

    fn folder(&self, prefix: &str) -> String {
        as_folder(&self.location.object_key(prefix))
    }
}

#[async_trait]
impl BucketAccess for MemoryBucket {
    fn backend_type(&self) -> BackendType {
        BackendType::Memory
    }

    fn location(&self) -> &ObjectLocation {
        &self.location
    }

    fn region(&self) -> &str {
        &self.region
    }

    fn scoped(&self, sub_path: &str) -> BoxedBucketAccess {
        Box::new(Self {
            store: self.store.clone(),
            location: self.location.child(sub_path),
            region: self.region.clone(),
        })
    }

    async fn list_prefixes(&self, prefix: &str) -> Result<BTreeSet<String>> {
        let keys = self.store.keys(self.bucket()).await?;
        Ok(child_prefixes(&keys, &self.folder(prefix)))
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>> {
        let keys = self.store.keys(self.bucket()).await?;
        Ok(child_objects(&keys, &self.folder(prefix)))
    }

    async fn find_objects(&self, prefix: &str) -> Result<Vec<String>> {
        let full_prefix = self.location.object_key(prefix);
        let keys = self.store.keys(self.bucket()).await?;
        Ok(keys
            .into_iter()
            .filter(|key| key.starts_with(&full_prefix))
            .collect())
    }

    async fn read(&self, key: &str) -> Result<Bytes> {
        let object = self
            .store
            .fetch(self.bucket(), &self.location.object_key(key))
            .await?;
        Ok(object.data)
    }

    async fn read_stream(&self, key: &str) -> Result<BoxStream<'static, Result<Bytes>>> {
        let data = self.read(key).await?;
        Ok(stream::once(async move { Ok(data) }).boxed())
    }

    async fn write(&self, key: &str, data: Bytes, content_type: Option<&str>) -> Result<()> {
        let full_key = self.location.object_key(key);
        tracing::debug!(bucket = %self.bucket(), key = %full_key, size = data.len(), "memory put");
        self.store
            .put(self.bucket(), &full_key, data, content_type)
            .await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let keys = self.store.keys(self.bucket()).await?;
        let full_key = self.location.object_key(key);
        Ok(keys.iter().any(|k| *k == full_key))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.store
            .remove(self.bucket(), &self.location.object_key(key))
            .await
    }

    async fn rename(&self, old_key: &str, new_key: &str) -> Result<()> {
        let from = self.location.object_key(old_key);
        let to = self.location.object_key(new_key);
        tracing::debug!(bucket = %self.bucket(), %from, %to, "memory rename");
        self.store.transfer(self.bucket(), &from, &to).await
    }

    async fn signed_link(&self, prefix: &str, key: &str, ttl: Duration) -> Result<String> {
        if !self.store.bucket_exists(self.bucket()).await {
            return Err(bucket_not_found(self.bucket()));
        }
        let full_key = self.location.object_key(&format!("{}{}", prefix, key));
        Ok(format!(
            "https://{}.s3.{}.amazonaws.com/{}?X-Amz-Expires={}",
            self.bucket(),
            self.region,
            full_key,
            ttl.as_secs()
        ))
    }
}
