//! Redis metadata backend
//!
//! Values are stored as plain Redis strings through a deadpool connection
//! pool, so several gateway instances can share one range cache.

use super::MetadataBackend;
use crate::error::{GatewayError, Result};
use ::redis::AsyncCommands;
use async_trait::async_trait;
use bytes::Bytes;
use deadpool_redis::{Config as PoolConfig, Connection, Pool, Runtime};
use tracing::{debug, info};

/// Default server used when no URL is configured
pub const DEFAULT_REDIS_URL: &str = "redis://localhost";

/// Metadata backend storing values in Redis
#[derive(Clone)]
pub struct RedisMetadata {
    pool: Pool,
    key_prefix: String,
}

impl RedisMetadata {
    /// Create a pooled backend for `url`
    ///
    /// No connection is opened until the first request, so an unreachable
    /// server surfaces as a metadata error on `get` or `put`.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let pool = PoolConfig::from_url(url.clone())
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| {
                GatewayError::MetadataError(format!("Failed to create Redis pool for {}: {}", url, e))
            })?;
        info!("Redis metadata store at {}", url);

        Ok(Self {
            pool,
            key_prefix: String::new(),
        })
    }

    /// Namespace every key as `prefix:key`
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    fn build_key(&self, key: &str) -> String {
        if self.key_prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}:{}", self.key_prefix, key)
        }
    }

    async fn connection(&self) -> Result<Connection> {
        self.pool.get().await.map_err(|e| {
            GatewayError::MetadataError(format!("Failed to get Redis connection: {}", e))
        })
    }
}

impl std::fmt::Debug for RedisMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisMetadata")
            .field("key_prefix", &self.key_prefix)
            .field("pool", &self.pool.status())
            .finish()
    }
}

#[async_trait]
impl MetadataBackend for RedisMetadata {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let full_key = self.build_key(key);
        let mut conn = self.connection().await?;

        let value: Option<Vec<u8>> = conn.get(&full_key).await.map_err(|e| {
            GatewayError::MetadataError(format!("Failed to read {} from Redis: {}", full_key, e))
        })?;
        Ok(value.map(Bytes::from))
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<()> {
        let full_key = self.build_key(key);
        let mut conn = self.connection().await?;

        let len = value.len();
        let _: () = conn.set(&full_key, value.to_vec()).await.map_err(|e| {
            GatewayError::MetadataError(format!("Failed to write {} to Redis: {}", full_key, e))
        })?;

        debug!("Wrote metadata key {} ({} bytes)", full_key, len);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_malformed_url() {
        let result = RedisMetadata::new("not a redis url");
        assert!(matches!(result, Err(GatewayError::MetadataError(_))));
    }

    #[test]
    fn test_key_prefix() {
        let backend = RedisMetadata::new(DEFAULT_REDIS_URL).unwrap();
        assert_eq!(backend.build_key("range/bucket/key"), "range/bucket/key");

        let backend = backend.with_key_prefix("s4");
        assert_eq!(backend.build_key("range/bucket/key"), "s4:range/bucket/key");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_metadata_error() {
        // nothing listens on port 1
        let backend = RedisMetadata::new("redis://127.0.0.1:1").unwrap();

        let err = backend.get("range/bucket/key").await.unwrap_err();
        assert!(matches!(err, GatewayError::MetadataError(_)));
        let err = backend
            .put("range/bucket/key", Bytes::from_static(b"0-9/10"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::MetadataError(_)));
    }

    /// Runs against a live server when `S4_TEST_REDIS_URL` is set
    #[tokio::test]
    async fn test_round_trip_against_live_server() {
        let Ok(url) = std::env::var("S4_TEST_REDIS_URL") else {
            return;
        };
        let prefix = format!("s4-test-{}", std::process::id());
        let backend = RedisMetadata::new(url).unwrap().with_key_prefix(prefix);

        assert!(backend.get("range/bucket/key").await.unwrap().is_none());
        backend
            .put("range/bucket/key", Bytes::from_static(b"90-99/100"))
            .await
            .unwrap();
        assert_eq!(
            backend.get("range/bucket/key").await.unwrap(),
            Some(Bytes::from_static(b"90-99/100"))
        );

        backend.put("range/bucket/key", Bytes::new()).await.unwrap();
        assert_eq!(backend.get("range/bucket/key").await.unwrap(), Some(Bytes::new()));
    }
}
