//! Object store addressing.
//!
//! An `ObjectLocation` names a store scheme, a bucket, and a path prefix
//! inside that bucket. Locations are immutable; narrower locations are
//! derived with [`ObjectLocation::child`].

use serde::{Deserialize, Serialize};

use crate::error::{Result, TransferError};

/// Default scheme for S3 and S3-compatible stores.
pub const S3_SCHEME: &str = "s3";

/// A bucket plus a path prefix inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "LocationParts")]
pub struct ObjectLocation {
    store_root: String,
    bucket: String,
    path_prefix: String,
}

/// Serialized form; prefixes are normalized on the way in.
#[derive(Deserialize)]
struct LocationParts {
    store_root: String,
    bucket: String,
    #[serde(default)]
    path_prefix: String,
}

impl From<LocationParts> for ObjectLocation {
    fn from(parts: LocationParts) -> Self {
        Self::with_scheme(parts.store_root, parts.bucket, parts.path_prefix)
    }
}

impl ObjectLocation {
    /// Create a location for a bucket root in an S3 store.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self::with_scheme(S3_SCHEME, bucket, "")
    }

    /// Create a location with an explicit scheme and prefix.
    pub fn with_scheme(
        store_root: impl Into<String>,
        bucket: impl Into<String>,
        path_prefix: impl AsRef<str>,
    ) -> Self {
        Self {
            store_root: store_root.into(),
            bucket: bucket.into(),
            path_prefix: normalize_prefix(path_prefix.as_ref()),
        }
    }

    /// Parse a `scheme://bucket/prefix` URL.
    pub fn parse(location: &str) -> Result<Self> {
        let (scheme, rest) = location
            .split_once("://")
            .ok_or_else(|| TransferError::InvalidLocation(location.to_string()))?;
        let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));
        if scheme.is_empty() || bucket.is_empty() {
            return Err(TransferError::InvalidLocation(location.to_string()));
        }
        Ok(Self::with_scheme(scheme, bucket, prefix))
    }

    /// Store scheme (e.g. "s3").
    pub fn store_root(&self) -> &str {
        &self.store_root
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Prefix inside the bucket, without a leading slash.
    pub fn path_prefix(&self) -> &str {
        &self.path_prefix
    }

    /// Render the location as `<scheme>://<bucket>[/<path_prefix>]`.
    pub fn canonical_url(&self) -> Result<String> {
        if self.bucket.trim().is_empty() {
            return Err(TransferError::InvalidLocation(
                "bucket name is empty".to_string(),
            ));
        }

        let bucket = self.bucket.trim_matches('/');
        if self.path_prefix.is_empty() {
            Ok(format!("{}://{}", self.store_root, bucket))
        } else {
            Ok(format!("{}://{}/{}", self.store_root, bucket, self.path_prefix))
        }
    }

    /// Derive a narrower location by extending the prefix with `sub_path`.
    pub fn child(&self, sub_path: &str) -> Self {
        Self {
            store_root: self.store_root.clone(),
            bucket: self.bucket.clone(),
            path_prefix: join_key(&self.path_prefix, sub_path),
        }
    }

    /// Resolve a key relative to this location into a key relative to the bucket root.
    pub fn object_key(&self, key: &str) -> String {
        join_key(&self.path_prefix, key)
    }

    /// Whether this location points at the bucket root.
    pub fn is_bucket_root(&self) -> bool {
        self.path_prefix.is_empty()
    }
}

impl std::fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = if self.path_prefix.is_empty() { "" } else { "/" };
        write!(
            f,
            "{}://{}{}{}",
            self.store_root, self.bucket, prefix, self.path_prefix
        )
    }
}

/// Join two key fragments with exactly one `/` between them.
///
/// A trailing slash on `tail` is preserved so directory-style prefixes stay
/// directory-style.
pub fn join_key(head: &str, tail: &str) -> String {
    let head = normalize_prefix(head);
    let tail = normalize_prefix(tail);
    match (head.is_empty(), tail.is_empty()) {
        (true, _) => tail,
        (false, true) => head,
        (false, false) => format!("{}/{}", head.trim_end_matches('/'), tail),
    }
}

/// Ensure a non-empty prefix ends with `/` so it names a folder.
pub fn as_folder(prefix: &str) -> String {
    let prefix = normalize_prefix(prefix);
    if prefix.is_empty() || prefix.ends_with('/') {
        prefix
    } else {
        format!("{}/", prefix)
    }
}

/// Strip the leading slash and collapse runs of `/`.
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_start_matches('/');
    let mut out = String::with_capacity(trimmed.len());
    let mut last_was_slash = false;
    for ch in trimmed.chars() {
        if ch == '/' {
            if !last_was_slash {
                out.push(ch);
            }
            last_was_slash = true;
        } else {
            out.push(ch);
            last_was_slash = false;
        }
    }
    out
}
