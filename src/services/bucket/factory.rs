//! Bucket handle factory.
//!
//! The factory holds the backend chosen by configuration and opens
//! handles on it, so callers never construct a backend directly.

use super::location::ObjectLocation;
use super::memory::{MemoryBucket, MemoryStore};
use super::s3::S3Bucket;
use super::traits::BoxedBucketAccess;
use super::types::{BackendType, StorageConfig};
use crate::error::Result;

/// Backend selected for every handle a factory opens.
#[derive(Debug, Clone)]
pub enum BucketBackend {
    /// Live S3 client.
    S3(StorageConfig),
    /// In-memory double over a caller-owned store.
    Memory {
        store: MemoryStore,
        config: StorageConfig,
    },
}

/// Factory for bucket handles.
///
/// # Example
///
/// ```ignore
/// let factory = BucketFactory::new(BucketBackend::S3(config));
/// let bucket = factory.open(ObjectLocation::new("example-bucket"))?;
/// ```
#[derive(Debug, Clone)]
pub struct BucketFactory {
    backend: BucketBackend,
}

impl BucketFactory {
    pub fn new(backend: BucketBackend) -> Self {
        Self { backend }
    }

    /// Get the backend type handles will be opened on.
    pub fn backend_type(&self) -> BackendType {
        match &self.backend {
            BucketBackend::S3(_) => BackendType::S3,
            BucketBackend::Memory { .. } => BackendType::Memory,
        }
    }

    fn config(&self) -> &StorageConfig {
        match &self.backend {
            BucketBackend::S3(config) | BucketBackend::Memory { config, .. } => config,
        }
    }

    /// Region every handle reports.
    pub fn region(&self) -> &str {
        &self.config().region
    }

    /// Open a handle on `location`.
    ///
    /// # Errors
    ///
    /// Returns `MissingCredentials` if the key pair is incomplete and
    /// `InvalidLocation` if the bucket name is empty; neither touches the store.
    pub fn open(&self, location: ObjectLocation) -> Result<BoxedBucketAccess> {
        match &self.backend {
            BucketBackend::S3(config) => S3Bucket::boxed(config, location),
            BucketBackend::Memory { store, config } => MemoryBucket::boxed(
                store.clone(),
                location,
                config.region.clone(),
                &config.credentials,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransferError;
    use crate::services::bucket::traits::BucketAccess;
    use crate::services::bucket::types::Credentials;

    fn config(secret: &str) -> StorageConfig {
        StorageConfig::new(Credentials::new("AMAZONKEYID", secret), "us-east-1")
    }

    #[test]
    fn test_factory_creates_s3() {
        let factory = BucketFactory::new(BucketBackend::S3(config("secret")));
        let bucket = factory.open(ObjectLocation::new("example-bucket")).unwrap();

        assert_eq!(factory.backend_type(), BackendType::S3);
        assert_eq!(bucket.backend_type(), BackendType::S3);
    }

    #[test]
    fn test_factory_creates_memory() {
        let factory = BucketFactory::new(BucketBackend::Memory {
            store: MemoryStore::new(),
            config: config("secret"),
        });
        let bucket = factory.open(ObjectLocation::new("example-bucket")).unwrap();

        assert_eq!(bucket.backend_type(), BackendType::Memory);
        assert_eq!(bucket.region(), "us-east-1");
    }

    #[test]
    fn test_factory_validates_credentials() {
        for backend in [
            BucketBackend::S3(config("")),
            BucketBackend::Memory {
                store: MemoryStore::new(),
                config: config(""),
            },
        ] {
            let result = BucketFactory::new(backend).open(ObjectLocation::new("b"));
            assert!(matches!(result, Err(TransferError::MissingCredentials)));
        }
    }
}
