//! S4 Gateway
//!
//! An S3-compatible object gateway that caches the footer of columnar files
//! (Parquet, Arrow IPC) on upload, so that the first range reads issued by
//! analytics readers are answered without touching the backing store.
//!
//! # Overview
//!
//! Every object owns a single cached byte range, stored as a descriptor plus
//! a data blob in a [`MetadataBackend`]. Uploads recompute that range through
//! the [`FooterCachePolicy`]; reads consult the [`RangeCache`] first and fall
//! back to the [`StorageBackend`] on a miss.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use s4_gateway::{BucketResolver, Gateway, InMemoryStorage, MemoryMetadata};
//! use std::sync::Arc;
//!
//! # async fn run() -> s4_gateway::Result<()> {
//! let gateway = Gateway::new(
//!     BucketResolver::new("127.0.0.1"),
//!     Arc::new(InMemoryStorage::new()),
//!     Arc::new(MemoryMetadata::new()),
//! )?;
//!
//! let digest = gateway
//!     .put_object("bucket.example.com", "data.parquet", None, "PAR1...".into())
//!     .await?;
//! println!("stored with etag {}", digest.etag);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`BucketResolver`]: maps Host header and path to bucket and key
//! - [`ByteRange`]: parses `Range: bytes=...` headers
//! - [`Md5Digest`]: ETag and `Content-MD5` computation
//! - [`RangeCache`]: per-object single-slot range cache
//! - [`FooterCachePolicy`]: picks the range to cache on upload
//! - [`Gateway`]: PUT, GET, HEAD and DELETE flows
//! - [`GatewayServer`]: hyper HTTP/1 front end with `/health` and `/metrics`
//!
//! # Configuration
//!
//! ```yaml
//! listen_address: "0.0.0.0:8000"
//! host: "127.0.0.1"
//! api_prefix: "/api/s3"
//! storage:
//!   backend: s3
//!   endpoint: "http://127.0.0.1:9000"
//!   region: "us-east-1"
//!   access_key_id: "minioadmin"
//!   secret_access_key: "minioadmin"
//! metadata:
//!   backend: redis
//!   url: "redis://127.0.0.1:6379"
//! footer_cache:
//!   formats: ["parquet", "arrow"]
//! ```
//!
//! Storage backends are `memory`, `http` (unsigned) and `s3` (SigV4 via the
//! AWS SDK). Metadata backends are `memory`, `disk`, `redis` and `noop`.
//! See [`GatewayConfig`] for all options.

pub mod bucket_resolver;
pub mod config;
pub mod digest;
pub mod error;
pub mod footer_policy;
pub mod handlers;
pub mod metadata;
pub mod metrics;
pub mod models;
pub mod range_cache;
pub mod server;
pub mod storage;

pub use bucket_resolver::BucketResolver;
pub use config::{FooterCacheConfig, GatewayConfig, MetadataConfig, StorageConfig};
pub use digest::Md5Digest;
pub use error::{GatewayError, Result};
pub use footer_policy::{ArrowIpcFooter, DetectedFooter, FooterCachePolicy, FooterFormat, ParquetFooter};
pub use handlers::{Gateway, ObjectRead, ReadSource};
pub use metadata::{DiskMetadata, MemoryMetadata, MetadataBackend, NoopMetadata, RedisMetadata};
pub use metrics::GatewayMetrics;
pub use models::{ByteRange, ObjectMetadata, ObjectPath, PartialData, RangeDescriptor};
pub use range_cache::RangeCache;
pub use server::GatewayServer;
pub use storage::{HttpStorage, InMemoryStorage, S3Storage, StorageBackend};
