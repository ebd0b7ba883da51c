//! Object request handlers
//!
//! [`Gateway`] ties the bucket resolver, range parser, digests, storage
//! backend and range cache together into the write, read, metadata and
//! delete flows. The typed operations (`put_object`, `get_object`, ...)
//! carry the logic; [`Gateway::handle`] adapts them to HTTP.

use crate::bucket_resolver::BucketResolver;
use crate::config::GatewayConfig;
use crate::digest::Md5Digest;
use crate::error::{GatewayError, Result};
use crate::footer_policy::FooterCachePolicy;
use crate::metadata::{DiskMetadata, MemoryMetadata, MetadataBackend, NoopMetadata, RedisMetadata};
use crate::metrics::GatewayMetrics;
use crate::models::{ByteRange, ObjectMetadata, ObjectPath, PartialData};
use crate::range_cache::RangeCache;
use crate::storage::{HttpStorage, InMemoryStorage, S3Storage, StorageBackend};
use bytes::Bytes;
use http::header::{
    ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, ETAG, HOST, RANGE,
};
use http::{HeaderMap, Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Header telling clients whether a read was served from the range cache
pub const X_CACHE: &str = "x-cache";

/// Where the bytes of a read came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadSource {
    Cache,
    Storage,
}

impl ReadSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadSource::Cache => "cache",
            ReadSource::Storage => "storage",
        }
    }
}

/// Result of a read through the gateway
#[derive(Debug, Clone)]
pub struct ObjectRead {
    pub object: ObjectPath,
    pub range: ByteRange,
    pub data: PartialData,
    /// Digest of the returned bytes, only computed for whole-object reads
    pub etag: Option<String>,
    pub source: ReadSource,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: String,
}

/// S3-compatible object gateway with a footer range cache
pub struct Gateway {
    resolver: BucketResolver,
    storage: Arc<dyn StorageBackend>,
    cache: RangeCache,
    footer_policy: FooterCachePolicy,
    metrics: GatewayMetrics,
    max_object_size: u64,
}

impl Gateway {
    /// Create a gateway with the default footer formats
    pub fn new(
        resolver: BucketResolver,
        storage: Arc<dyn StorageBackend>,
        metadata: Arc<dyn MetadataBackend>,
    ) -> Result<Self> {
        let metrics = GatewayMetrics::new().map_err(|e| {
            GatewayError::InternalError(format!("Failed to create metrics: {}", e))
        })?;

        Ok(Gateway {
            resolver,
            storage,
            cache: RangeCache::new(metadata),
            footer_policy: FooterCachePolicy::default(),
            metrics,
            max_object_size: u64::MAX,
        })
    }

    /// Build a gateway and its backends from configuration
    pub async fn from_config(config: &GatewayConfig) -> Result<Self> {
        config.validate()?;

        let storage: Arc<dyn StorageBackend> = match config.storage.backend.as_str() {
            "http" => {
                let endpoint = config.storage.endpoint.as_deref().ok_or_else(|| {
                    GatewayError::ConfigError("storage.endpoint is required".to_string())
                })?;
                info!("Using HTTP storage backend at {}", endpoint);
                Arc::new(HttpStorage::with_timeout(
                    endpoint,
                    Duration::from_secs(config.storage.timeout_secs),
                )?)
            }
            "s3" => Arc::new(S3Storage::from_config(&config.storage).await?),
            _ => {
                info!("Using in-memory storage backend");
                Arc::new(InMemoryStorage::new())
            }
        };

        let metadata: Arc<dyn MetadataBackend> = match config.metadata.backend.as_str() {
            "disk" => Arc::new(DiskMetadata::new(&config.metadata.directory).await?),
            "redis" => Arc::new(
                RedisMetadata::new(config.metadata.url.as_str())?
                    .with_key_prefix(config.metadata.key_prefix.as_str()),
            ),
            "noop" => {
                info!("Range cache disabled (noop metadata backend)");
                Arc::new(NoopMetadata)
            }
            _ => Arc::new(MemoryMetadata::new()),
        };

        let footer_policy = if config.footer_cache.enabled {
            FooterCachePolicy::from_names(&config.footer_cache.formats)
        } else {
            FooterCachePolicy::new()
        };

        Ok(Gateway::new(BucketResolver::new(config.host.clone()), storage, metadata)?
            .with_footer_policy(footer_policy)
            .with_max_object_size(config.max_object_size))
    }

    pub fn with_footer_policy(mut self, footer_policy: FooterCachePolicy) -> Self {
        self.footer_policy = footer_policy;
        self
    }

    pub fn with_metrics(mut self, metrics: GatewayMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_max_object_size(mut self, max_object_size: u64) -> Self {
        self.max_object_size = max_object_size;
        self
    }

    pub fn metrics(&self) -> &GatewayMetrics {
        &self.metrics
    }

    pub fn cache(&self) -> &RangeCache {
        &self.cache
    }

    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }

    /// Store an object and cache its footer
    ///
    /// A `Content-MD5` header is checked before anything is written, so a
    /// mismatching upload leaves no object behind.
    pub async fn put_object(
        &self,
        host: &str,
        path: &str,
        content_md5: Option<&str>,
        body: Bytes,
    ) -> Result<Md5Digest> {
        let object = self.resolver.resolve(host, path);
        if body.len() as u64 > self.max_object_size {
            return Err(GatewayError::EntityTooLarge {
                limit: self.max_object_size,
            });
        }

        let digest = Md5Digest::compute(&body);
        if let Some(content_md5) = content_md5 {
            digest.verify_content_md5(content_md5)?;
        }

        self.storage
            .put(&object.bucket, &object.key, body.clone())
            .await?;
        info!(
            "Stored {} ({} bytes, etag={})",
            object,
            body.len(),
            digest.etag
        );

        self.refresh_cached_range(&object, &body).await;
        Ok(digest)
    }

    /// Replace or drop the cached range after an upload
    ///
    /// Cache failures are logged and never fail the upload.
    async fn refresh_cached_range(&self, object: &ObjectPath, body: &Bytes) {
        let id = object.cache_key();
        match self.footer_policy.apply(&self.cache, &id, body).await {
            Ok(Some(footer)) => {
                self.metrics.record_footer_cached(footer.format);
                return;
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to cache footer for {}: {}", object, e),
        }

        // Whatever was cached belongs to the previous body
        if let Err(e) = self.cache.invalidate(&id).await {
            warn!("Failed to invalidate cached range for {}: {}", object, e);
        }
    }

    /// Read an object or a byte range of it
    ///
    /// The range cache is consulted first; a miss or cache failure falls
    /// back to the storage backend.
    pub async fn get_object(
        &self,
        host: &str,
        path: &str,
        range_header: Option<&str>,
    ) -> Result<ObjectRead> {
        let object = self.resolver.resolve(host, path);
        let range = ByteRange::from_optional_header(range_header)?;
        let id = object.cache_key();

        match self
            .cache
            .get_cached_range(&id, range.start, range.end_exclusive())
            .await
        {
            Ok(Some(data)) => {
                debug!("Cache HIT: {} range={}", object, range);
                self.metrics.record_cache_lookup("hit");
                let etag = (!range.is_range_request()).then(|| Md5Digest::compute(&data.data).etag);
                return Ok(ObjectRead {
                    object,
                    range,
                    data,
                    etag,
                    source: ReadSource::Cache,
                });
            }
            Ok(None) => {
                debug!("Cache MISS: {} range={}", object, range);
                self.metrics.record_cache_lookup("miss");
            }
            Err(e) => {
                warn!("Range cache lookup failed for {}: {}", object, e);
                self.metrics.record_cache_lookup("error");
            }
        }

        let requested = range.is_range_request().then_some(range);
        let data = self
            .storage
            .get(&object.bucket, &object.key, requested)
            .await?;
        let etag = requested
            .is_none()
            .then(|| Md5Digest::compute(&data.data).etag);

        Ok(ObjectRead {
            object,
            range,
            data,
            etag,
            source: ReadSource::Storage,
        })
    }

    /// Object size and ETag, straight from the storage backend
    pub async fn head_object(&self, host: &str, path: &str) -> Result<ObjectMetadata> {
        let object = self.resolver.resolve(host, path);
        self.storage.head(&object.bucket, &object.key).await
    }

    /// Delete an object and drop its cached range
    pub async fn delete_object(&self, host: &str, path: &str) -> Result<()> {
        let object = self.resolver.resolve(host, path);
        self.storage.delete(&object.bucket, &object.key).await?;
        info!("Deleted {}", object);

        if let Err(e) = self.cache.invalidate(&object.cache_key()).await {
            warn!("Failed to invalidate cached range for {}: {}", object, e);
        }
        Ok(())
    }

    /// Handle an HTTP request addressed to `path` below the API prefix
    pub async fn handle<B>(&self, req: Request<B>, path: &str) -> Response<Full<Bytes>>
    where
        B: hyper::body::Body<Data = Bytes>,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let method = req.method().clone();
        let operation = match method {
            Method::PUT => "put",
            Method::GET => "get",
            Method::HEAD => "head",
            Method::DELETE => "delete",
            _ => {
                let response = finish(
                    Response::builder()
                        .status(StatusCode::METHOD_NOT_ALLOWED)
                        .header("allow", "GET, HEAD, PUT, DELETE"),
                    Bytes::new(),
                );
                self.metrics.record_request("other", response.status().as_u16());
                return response;
            }
        };

        let result = match host_of(&req) {
            Ok(host) => match method {
                Method::PUT => self.handle_put(req, &host, path).await,
                Method::GET => self.handle_get(req.headers(), &host, path).await,
                Method::HEAD => self.handle_head(&host, path).await,
                _ => self.handle_delete(&host, path).await,
            },
            Err(e) => Err(e),
        };

        let response = result.unwrap_or_else(|e| {
            if e.is_client_error() {
                debug!("{} {} rejected: {}", method, path, e);
            } else {
                warn!("{} {} failed: {}", method, path, e);
            }
            error_response(&e)
        });
        self.metrics
            .record_request(operation, response.status().as_u16());
        response
    }

    async fn handle_put<B>(&self, req: Request<B>, host: &str, path: &str) -> Result<Response<Full<Bytes>>>
    where
        B: hyper::body::Body<Data = Bytes>,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let content_md5 = header_str(req.headers(), "content-md5")?.map(str::to_string);

        let declared_len = header_str(req.headers(), CONTENT_LENGTH.as_str())?
            .and_then(|v| v.parse::<u64>().ok());
        if declared_len.map_or(false, |len| len > self.max_object_size) {
            return Err(GatewayError::EntityTooLarge {
                limit: self.max_object_size,
            });
        }

        let limit = usize::try_from(self.max_object_size).unwrap_or(usize::MAX);
        let body = Limited::new(req.into_body(), limit)
            .collect()
            .await
            .map_err(|e| {
                if e.downcast_ref::<LengthLimitError>().is_some() {
                    GatewayError::EntityTooLarge {
                        limit: self.max_object_size,
                    }
                } else {
                    GatewayError::InvalidRequest(format!("Failed to read request body: {}", e))
                }
            })?
            .to_bytes();

        let digest = self
            .put_object(host, path, content_md5.as_deref(), body)
            .await?;

        Ok(finish(
            Response::builder()
                .status(StatusCode::OK)
                .header(ETAG, digest.etag),
            Bytes::new(),
        ))
    }

    async fn handle_get(&self, headers: &HeaderMap, host: &str, path: &str) -> Result<Response<Full<Bytes>>> {
        let range_header = header_str(headers, RANGE.as_str())?;
        let read = self.get_object(host, path, range_header).await?;
        self.metrics
            .record_bytes_served(read.source.as_str(), read.data.data.len());

        let mut builder = Response::builder()
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_LENGTH, read.data.data.len())
            .header(ACCEPT_RANGES, "bytes")
            .header(
                X_CACHE,
                match read.source {
                    ReadSource::Cache => "HIT",
                    ReadSource::Storage => "MISS",
                },
            );

        if read.range.is_range_request() {
            builder = builder
                .status(StatusCode::PARTIAL_CONTENT)
                .header(CONTENT_RANGE, read.data.content_range(read.range.start));
        } else {
            builder = builder.status(StatusCode::OK);
        }
        if let Some(etag) = &read.etag {
            builder = builder.header(ETAG, etag.as_str());
        }

        Ok(finish(builder, read.data.data))
    }

    async fn handle_head(&self, host: &str, path: &str) -> Result<Response<Full<Bytes>>> {
        let metadata = self.head_object(host, path).await?;
        Ok(finish(
            Response::builder()
                .status(StatusCode::OK)
                .header(ETAG, metadata.etag)
                .header(CONTENT_LENGTH, metadata.total)
                .header(ACCEPT_RANGES, "bytes"),
            Bytes::new(),
        ))
    }

    async fn handle_delete(&self, host: &str, path: &str) -> Result<Response<Full<Bytes>>> {
        self.delete_object(host, path).await?;
        Ok(finish(
            Response::builder().status(StatusCode::NO_CONTENT),
            Bytes::new(),
        ))
    }
}

/// Host the request was addressed to, from the Host header or the URI
fn host_of<B>(req: &Request<B>) -> Result<String> {
    if let Some(host) = header_str(req.headers(), HOST.as_str())? {
        if !host.is_empty() {
            return Ok(host.to_string());
        }
    }
    req.uri()
        .authority()
        .map(|authority| authority.as_str().to_string())
        .ok_or_else(|| GatewayError::InvalidRequest("missing Host header".to_string()))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>> {
    headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map_err(|_| GatewayError::InvalidRequest(format!("{} header is not valid text", name)))
        })
        .transpose()
}

/// Build the JSON error response for `err`
pub fn error_response(err: &GatewayError) -> Response<Full<Bytes>> {
    let status =
        StatusCode::from_u16(err.to_http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = serde_json::to_vec(&ErrorBody {
        code: err.code(),
        message: err.to_string(),
    })
    .unwrap_or_default();

    finish(
        Response::builder()
            .status(status)
            .header(CONTENT_TYPE, "application/json"),
        Bytes::from(body),
    )
}

/// Attach `body` to `builder`, falling back to a bare 500 if the head is invalid
pub(crate) fn finish(builder: http::response::Builder, body: Bytes) -> Response<Full<Bytes>> {
    builder.body(Full::new(body)).unwrap_or_else(|e| {
        error!("Failed to build response: {}", e);
        let mut response = Response::new(Full::new(Bytes::new()));
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        response
    })
}
