//! Bucket access over object stores.
//!
//! This module addresses objects and prefixes in a bucket-like store and
//! exposes one capability set over two backends:
//!
//! - **Amazon S3** and S3-compatible services, through Apache OpenDAL
//! - **In-memory** store for tests, owned by the caller
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    BucketFactory                            │
//! │  - Holds the backend selected by configuration              │
//! │  - Validates credentials before opening a handle            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                  ┌───────────┴───────────┐
//!                  ▼                       ▼
//! ┌──────────────────────────┐ ┌──────────────────────────┐
//! │   S3Bucket (OpenDAL)     │ │  MemoryBucket            │
//! │                          │ │  (MemoryStore)           │
//! └──────────────────────────┘ └──────────────────────────┘
//! ```
//!
//! Every handle owns one [`ObjectLocation`]; [`BucketAccess::scoped`] derives
//! a sub-path view sharing the same backend and region.

mod factory;
mod location;
mod memory;
mod s3;
mod traits;
mod types;

pub use factory::{BucketBackend, BucketFactory};
pub use location::{as_folder, join_key, ObjectLocation, S3_SCHEME};
pub use memory::{MemoryBucket, MemoryStore, StoredObject};
pub use s3::S3Bucket;
pub use traits::{BoxedBucketAccess, BucketAccess};
pub use types::{BackendType, Credentials, StorageConfig};
