//! Metadata backend that stores nothing

use super::MetadataBackend;
use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;

/// Discards every write; every lookup misses
///
/// Plugging this into the range cache disables caching entirely.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetadata;

#[async_trait]
impl MetadataBackend for NoopMetadata {
    async fn get(&self, _key: &str) -> Result<Option<Bytes>> {
        Ok(None)
    }

    async fn put(&self, _key: &str, _value: Bytes) -> Result<()> {
        Ok(())
    }
}
