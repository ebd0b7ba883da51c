//! Metadata key-value capability
//!
//! The range cache stores its descriptors and cached bytes through
//! [`MetadataBackend`], an opaque blob store with no range semantics and
//! no transactions.

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;

pub mod disk;
pub mod memory;
pub mod noop;
pub mod redis;

pub use self::redis::RedisMetadata;
pub use disk::DiskMetadata;
pub use memory::MemoryMetadata;
pub use noop::NoopMetadata;

/// Opaque byte blob store keyed by string
#[async_trait]
pub trait MetadataBackend: Send + Sync {
    /// Fetch the value stored under `key`
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Store `value` under `key`, overwriting any previous value
    async fn put(&self, key: &str, value: Bytes) -> Result<()>;
}
