//! In-memory storage backend

use super::StorageBackend;
use crate::digest::Md5Digest;
use crate::error::{GatewayError, Result};
use crate::models::{ByteRange, ObjectMetadata, PartialData};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone)]
struct StoredObject {
    body: Bytes,
    etag: String,
}

/// Storage backend keeping every object in process memory
///
/// Intended for tests and single-node development setups.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    namespaces: RwLock<HashMap<String, HashMap<String, StoredObject>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects held across all namespaces
    pub async fn object_count(&self) -> usize {
        self.namespaces.read().await.values().map(HashMap::len).sum()
    }

    async fn lookup(&self, namespace: &str, key: &str) -> Result<StoredObject> {
        self.namespaces
            .read()
            .await
            .get(namespace)
            .and_then(|objects| objects.get(key))
            .cloned()
            .ok_or_else(|| GatewayError::NotFound {
                bucket: namespace.to_string(),
                key: key.to_string(),
            })
    }
}

/// Cut `range` out of a whole object body
///
/// The end is clamped to the last byte; a start at or past the end of the
/// body is unsatisfiable.
pub(crate) fn slice_body(body: &Bytes, range: &ByteRange) -> Result<Bytes> {
    let total = body.len() as u64;
    if range.start >= total {
        return Err(GatewayError::UnsatisfiableRange(format!(
            "range {} starts beyond object size {}",
            range, total
        )));
    }
    let end = range.end.map_or(total - 1, |end| end.min(total - 1));
    Ok(body.slice(range.start as usize..=end as usize))
}

#[async_trait]
impl StorageBackend for InMemoryStorage {
    async fn put(&self, namespace: &str, key: &str, body: Bytes) -> Result<()> {
        let etag = Md5Digest::compute(&body).etag;
        debug!("Storing {}/{} ({} bytes) in memory", namespace, key, body.len());
        self.namespaces
            .write()
            .await
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), StoredObject { body, etag });
        Ok(())
    }

    async fn get(&self, namespace: &str, key: &str, range: Option<ByteRange>) -> Result<PartialData> {
        let object = self.lookup(namespace, key).await?;
        let total = object.body.len() as u64;
        let data = match range {
            Some(range) => slice_body(&object.body, &range)?,
            None => object.body,
        };
        Ok(PartialData::new(data, total))
    }

    async fn head(&self, namespace: &str, key: &str) -> Result<ObjectMetadata> {
        let object = self.lookup(namespace, key).await?;
        Ok(ObjectMetadata {
            etag: object.etag,
            total: object.body.len() as u64,
        })
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<()> {
        let removed = self
            .namespaces
            .write()
            .await
            .get_mut(namespace)
            .and_then(|objects| objects.remove(key));

        match removed {
            Some(_) => Ok(()),
            None => Err(GatewayError::NotFound {
                bucket: namespace.to_string(),
                key: key.to_string(),
            }),
        }
    }

    async fn list_objects(&self, namespace: &str, prefix: &str) -> Result<Vec<String>> {
        let namespaces = self.namespaces.read().await;
        let mut keys: Vec<String> = namespaces
            .get(namespace)
            .map(|objects| {
                objects
                    .keys()
                    .filter(|key| key.starts_with(prefix))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        keys.sort();
        Ok(keys)
    }
}
