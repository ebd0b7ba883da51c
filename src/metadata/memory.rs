//! In-memory metadata backend

use super::MetadataBackend;
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::RwLock;

/// Metadata backend backed by a process-local map
#[derive(Debug, Default)]
pub struct MemoryMetadata {
    storage: RwLock<HashMap<String, Bytes>>,
}

impl MemoryMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.storage.read().map(|storage| storage.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MetadataBackend for MemoryMetadata {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let storage = self
            .storage
            .read()
            .map_err(|e| GatewayError::MetadataError(format!("lock poisoned: {}", e)))?;
        Ok(storage.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<()> {
        let mut storage = self
            .storage
            .write()
            .map_err(|e| GatewayError::MetadataError(format!("lock poisoned: {}", e)))?;
        storage.insert(key.to_string(), value);
        Ok(())
    }
}
