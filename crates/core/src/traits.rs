//! ObjectStore trait definition
//!
//! This trait is the seam between the bucket façade and whatever SDK talks to
//! the object store. The façade never sees SDK types.

use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::path::ObjectPath;

/// Metadata for an object or bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectInfo {
    /// Object key or bucket name
    pub key: String,

    /// Size in bytes (None for buckets)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<i64>,

    /// Human-readable size
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_human: Option<String>,

    /// Last modified timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<Timestamp>,

    /// ETag (usually MD5 for single-part uploads)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,

    /// Storage class
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,

    /// Content type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl ObjectInfo {
    /// Create a new ObjectInfo for a file
    pub fn file(key: impl Into<String>, size: i64) -> Self {
        Self {
            key: key.into(),
            size_bytes: Some(size),
            size_human: Some(humansize::format_size(size.max(0) as u64, humansize::BINARY)),
            last_modified: None,
            etag: None,
            storage_class: None,
            content_type: None,
        }
    }

    /// Create a new ObjectInfo for a bucket
    pub fn bucket(name: impl Into<String>) -> Self {
        Self {
            key: name.into(),
            size_bytes: None,
            size_human: None,
            last_modified: None,
            etag: None,
            storage_class: None,
            content_type: None,
        }
    }
}

/// One page of a listing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListPage {
    /// Listed objects
    pub items: Vec<ObjectInfo>,

    /// Whether the result is truncated (more items available)
    pub truncated: bool,

    /// Continuation token for the next page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continuation_token: Option<String>,
}

/// Options for list operations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListOptions {
    /// Maximum number of keys to return per request
    pub max_keys: Option<i32>,

    /// Continuation token from the previous page
    pub continuation_token: Option<String>,
}

/// A key the provider refused to delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyError {
    pub key: String,
    pub code: String,
    pub message: String,
}

/// Provider response to one batched delete request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOutcome {
    /// Keys the provider confirmed as deleted
    pub deleted: Vec<String>,

    /// Keys the provider reported as failed
    pub errors: Vec<KeyError>,
}

/// Trait for S3-compatible storage operations
///
/// `head_object` and `get_object` must report an absent key as
/// `Error::NotFound`. Every other failure is returned unchanged.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List buckets visible to the session
    async fn list_buckets(&self) -> Result<Vec<ObjectInfo>>;

    /// Fetch one page of objects under `path.key`
    async fn list_objects(&self, path: &ObjectPath, options: ListOptions) -> Result<ListPage>;

    /// Get object metadata
    async fn head_object(&self, path: &ObjectPath) -> Result<ObjectInfo>;

    /// Get object content as bytes
    async fn get_object(&self, path: &ObjectPath) -> Result<Vec<u8>>;

    /// Store `data` under `path`, replacing any existing object
    async fn put_object(
        &self,
        path: &ObjectPath,
        data: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<ObjectInfo>;

    /// Delete a single object
    async fn delete_object(&self, path: &ObjectPath) -> Result<()>;

    /// Delete up to one request's worth of keys
    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<DeleteOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_info_file() {
        let info = ObjectInfo::file("test.txt", 1024);
        assert_eq!(info.key, "test.txt");
        assert_eq!(info.size_bytes, Some(1024));
        assert_eq!(info.size_human.as_deref(), Some("1 KiB"));
    }

    #[test]
    fn test_object_info_bucket() {
        let info = ObjectInfo::bucket("my-bucket");
        assert_eq!(info.key, "my-bucket");
        assert!(info.size_bytes.is_none());
    }

    #[test]
    fn test_object_info_skips_empty_fields() {
        let json = serde_json::to_value(ObjectInfo::bucket("logs")).unwrap();
        assert_eq!(json, serde_json::json!({ "key": "logs" }));
    }
}
