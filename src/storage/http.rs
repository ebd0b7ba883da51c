//! Storage backend forwarding to an upstream S3-compatible endpoint
//!
//! Objects are addressed path-style as `{endpoint}/{bucket}/{key}`.
//! Requests are sent unsigned, so the upstream must accept anonymous access.
//! Use [`S3Storage`](super::S3Storage) for stores that need signed requests.

use super::memory::slice_body;
use super::StorageBackend;
use crate::error::{GatewayError, Result};
use crate::models::{ByteRange, ObjectMetadata, PartialData};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Response, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Storage backend talking HTTP to an S3-compatible object store
pub struct HttpStorage {
    client: Client,
    endpoint: Url,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListBucketResult {
    #[serde(default)]
    contents: Vec<ListEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListEntry {
    key: String,
}

impl HttpStorage {
    /// Create a backend for `endpoint` with a 30 second request timeout
    pub fn new(endpoint: &str) -> Result<Self> {
        Self::with_timeout(endpoint, Duration::from_secs(30))
    }

    /// Create a backend for `endpoint` with a custom request timeout
    pub fn with_timeout(endpoint: &str, timeout: Duration) -> Result<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            GatewayError::ConfigError(format!("Invalid storage endpoint '{}': {}", endpoint, e))
        })?;
        if endpoint.cannot_be_a_base() {
            return Err(GatewayError::ConfigError(format!(
                "Storage endpoint '{}' cannot be used as a base URL",
                endpoint
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::HttpError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(HttpStorage { client, endpoint })
    }

    fn object_url(&self, namespace: &str, key: &str) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::InternalError("endpoint cannot be a base".to_string()))?
            .pop_if_empty()
            .push(namespace)
            .extend(key.split('/'));
        Ok(url)
    }

    /// Map a non-success upstream response to a gateway error
    fn check_status(response: &Response, namespace: &str, key: &str) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        warn!(
            "Storage backend returned status={} for {}/{}",
            status, namespace, key
        );
        Err(match status {
            StatusCode::NOT_FOUND => GatewayError::NotFound {
                bucket: namespace.to_string(),
                key: key.to_string(),
            },
            StatusCode::RANGE_NOT_SATISFIABLE => GatewayError::UnsatisfiableRange(format!(
                "backend rejected range for {}/{}",
                namespace, key
            )),
            other => GatewayError::from_http_status(
                other.as_u16(),
                format!("{} {}/{}", other, namespace, key),
            ),
        })
    }
}

/// Total size from a `Content-Range: bytes a-b/total` header
pub(super) fn total_from_content_range(value: &str) -> Option<u64> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}

#[async_trait]
impl StorageBackend for HttpStorage {
    async fn put(&self, namespace: &str, key: &str, body: Bytes) -> Result<()> {
        let url = self.object_url(namespace, key)?;
        debug!("PUT {} ({} bytes)", url, body.len());
        let response = self.client.put(url).body(body).send().await?;
        Self::check_status(&response, namespace, key)
    }

    async fn get(&self, namespace: &str, key: &str, range: Option<ByteRange>) -> Result<PartialData> {
        let url = self.object_url(namespace, key)?;
        let mut request = self.client.get(url.clone());
        if let Some(range) = range {
            request = request.header(http::header::RANGE, range.to_header());
        }
        debug!("GET {} range={:?}", url, range);

        let response = request.send().await?;
        Self::check_status(&response, namespace, key)?;

        let status = response.status();
        let content_range_total = response
            .headers()
            .get(http::header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(total_from_content_range);
        let body = response.bytes().await?;

        match (range, status) {
            (Some(_), StatusCode::PARTIAL_CONTENT) => {
                let total = content_range_total.unwrap_or(body.len() as u64);
                Ok(PartialData::new(body, total))
            }
            // Upstream ignored the Range header and sent the whole object
            (Some(range), _) => {
                let total = body.len() as u64;
                Ok(PartialData::new(slice_body(&body, &range)?, total))
            }
            (None, _) => {
                let total = body.len() as u64;
                Ok(PartialData::new(body, total))
            }
        }
    }

    async fn head(&self, namespace: &str, key: &str) -> Result<ObjectMetadata> {
        let url = self.object_url(namespace, key)?;
        let response = self.client.head(url).send().await?;
        Self::check_status(&response, namespace, key)?;

        let headers = response.headers();
        let total = headers
            .get(http::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| {
                GatewayError::StorageError(format!(
                    "Content-Length header missing or invalid for {}/{}",
                    namespace, key
                ))
            })?;
        let etag = headers
            .get(http::header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim_matches('"').to_string())
            .ok_or_else(|| {
                GatewayError::StorageError(format!("ETag header missing for {}/{}", namespace, key))
            })?;

        Ok(ObjectMetadata { etag, total })
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<()> {
        let url = self.object_url(namespace, key)?;
        debug!("DELETE {}", url);
        let response = self.client.delete(url).send().await?;
        Self::check_status(&response, namespace, key)
    }

    /// Only the first page of a ListObjectsV2 response is returned
    async fn list_objects(&self, namespace: &str, prefix: &str) -> Result<Vec<String>> {
        let mut url = self.object_url(namespace, "")?;
        url.query_pairs_mut()
            .append_pair("list-type", "2")
            .append_pair("prefix", prefix);

        let response = self.client.get(url).send().await?;
        Self::check_status(&response, namespace, prefix)?;
        let body = response.text().await?;

        let listing: ListBucketResult = quick_xml::de::from_str(&body).map_err(|e| {
            GatewayError::StorageError(format!("Failed to parse bucket listing: {}", e))
        })?;
        Ok(listing.contents.into_iter().map(|entry| entry.key).collect())
    }
}
