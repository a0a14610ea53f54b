/*!
Object storage for finished archives.

This module defines the storage abstraction (port) the backup job uploads
through, and the S3 implementation (adapter). The job only sees
[`ObjectStore`], so tests can swap in an in-memory store.
*/

#[cfg(feature = "aws")]
pub mod s3;

use crate::Result;
use async_trait::async_trait;

/// Content type recorded on uploaded archives
pub const ARCHIVE_CONTENT_TYPE: &str = "application/zip";

/// Proof that an object was stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    /// Key the object was stored under
    pub key: String,
    /// Size of the uploaded body in bytes
    pub size: usize,
    /// ETag returned by the store, when it provides one
    pub e_tag: Option<String>,
    /// Hex SHA-256 digest of the uploaded body
    pub sha256: String,
}

/// Storage abstraction for uploading archives
///
/// A returned `Ok` means the store accepted the object; any rejection is an
/// `Err`, never a success-shaped value.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload `body` under `key`
    async fn put_object(&self, key: &str, body: Vec<u8>) -> Result<UploadReceipt>;
}

#[cfg(feature = "aws")]
pub use s3::S3ObjectStore;

/// Memory-based object store for testing
///
/// Stores uploads in a HashMap so tests can inspect what was written.
#[cfg(test)]
#[derive(Clone)]
pub struct MemoryObjectStore {
    objects: std::sync::Arc<std::sync::Mutex<std::collections::HashMap<String, Vec<u8>>>>,
}

#[cfg(test)]
impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl MemoryObjectStore {
    pub fn new() -> Self {
        Self {
            objects: std::sync::Arc::new(std::sync::Mutex::new(std::collections::HashMap::new())),
        }
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }
}

#[cfg(test)]
#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_object(&self, key: &str, body: Vec<u8>) -> Result<UploadReceipt> {
        let receipt = UploadReceipt {
            key: key.to_string(),
            size: body.len(),
            e_tag: None,
            sha256: crate::archive::sha256_hex(&body),
        };
        self.objects.lock().unwrap().insert(key.to_string(), body);
        Ok(receipt)
    }
}
