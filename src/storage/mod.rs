//! Object storage capability
//!
//! The gateway only talks to the backing object store through
//! [`StorageBackend`]. Objects are addressed by a namespace (the bucket)
//! and a key.

use crate::error::Result;
use crate::models::{ByteRange, ObjectMetadata, PartialData};
use async_trait::async_trait;
use bytes::Bytes;

pub mod http;
pub mod memory;
pub mod s3;

pub use self::http::HttpStorage;
pub use self::memory::InMemoryStorage;
pub use self::s3::S3Storage;

/// Whole or ranged object access on a backing store
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write an object, replacing any previous body
    async fn put(&self, namespace: &str, key: &str, body: Bytes) -> Result<()>;

    /// Read an object or a byte range of it
    ///
    /// The returned `total` is always the full object size, also for
    /// ranged reads.
    async fn get(&self, namespace: &str, key: &str, range: Option<ByteRange>) -> Result<PartialData>;

    /// Size and ETag of an object without its body
    async fn head(&self, namespace: &str, key: &str) -> Result<ObjectMetadata>;

    /// Delete an object
    async fn delete(&self, namespace: &str, key: &str) -> Result<()>;

    /// Keys in `namespace` starting with `prefix`
    async fn list_objects(&self, namespace: &str, prefix: &str) -> Result<Vec<String>>;
}
