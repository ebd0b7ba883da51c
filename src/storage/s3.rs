//! Storage backend speaking the S3 API through the AWS SDK
//!
//! Every request is SigV4-signed with either static keys from the
//! configuration or the AWS default credential chain (environment,
//! profile, instance metadata). With a custom endpoint the client switches
//! to path-style addressing so MinIO and similar stores work unchanged.

use super::http::total_from_content_range;
use super::memory::slice_body;
use super::StorageBackend;
use crate::config::StorageConfig;
use crate::error::{GatewayError, Result};
use crate::models::{ByteRange, ObjectMetadata, PartialData};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{
    Credentials, Region, RequestChecksumCalculation, ResponseChecksumValidation,
};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Storage backend talking to S3 or an S3-compatible store with signed requests
#[derive(Debug, Clone)]
pub struct S3Storage {
    client: Client,
}

impl S3Storage {
    /// Build a client from the storage section of the gateway config
    ///
    /// Static keys are used when both are configured, otherwise the AWS
    /// default credential chain is loaded.
    pub async fn from_config(config: &StorageConfig) -> Result<Self> {
        let region = Region::new(config.region.clone());

        let mut builder = match (&config.access_key_id, &config.secret_access_key) {
            (Some(access_key_id), Some(secret_access_key)) => aws_sdk_s3::Config::builder()
                .behavior_version_latest()
                .credentials_provider(Credentials::new(
                    access_key_id,
                    secret_access_key,
                    None,
                    None,
                    "s4-gateway",
                )),
            (None, None) => {
                let shared = aws_config::defaults(BehaviorVersion::latest())
                    .region(region.clone())
                    .load()
                    .await;
                aws_sdk_s3::config::Builder::from(&shared)
            }
            _ => {
                return Err(GatewayError::ConfigError(
                    "storage.access_key_id and storage.secret_access_key must be set together"
                        .to_string(),
                ))
            }
        };

        builder = builder
            .region(region)
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(Duration::from_secs(config.timeout_secs))
                    .build(),
            )
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
            .response_checksum_validation(ResponseChecksumValidation::WhenRequired);

        match config.endpoint.as_deref() {
            Some(endpoint) => {
                info!(
                    "Using S3 storage backend at {} (region {}, path-style)",
                    endpoint, config.region
                );
                builder = builder.endpoint_url(endpoint).force_path_style(true);
            }
            None => info!("Using S3 storage backend in region {}", config.region),
        }

        Ok(Self::with_client(Client::from_conf(builder.build())))
    }

    /// Wrap an already configured SDK client
    pub fn with_client(client: Client) -> Self {
        S3Storage { client }
    }
}

/// Map an SDK failure to a gateway error
fn map_sdk_error<E>(err: SdkError<E, HttpResponse>, namespace: &str, key: &str) -> GatewayError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let status = err.raw_response().map(|response| response.status().as_u16());
    let code = err.code().map(str::to_string);
    let message = DisplayErrorContext(&err).to_string();
    warn!(
        "S3 request for {}/{} failed: status={:?} code={:?}",
        namespace, key, status, code
    );

    if matches!(err, SdkError::TimeoutError(_)) {
        return GatewayError::Timeout(format!("{}/{}: {}", namespace, key, message));
    }

    match (status, code.as_deref()) {
        (Some(404), _) | (_, Some("NoSuchKey")) | (_, Some("NotFound")) => GatewayError::NotFound {
            bucket: namespace.to_string(),
            key: key.to_string(),
        },
        (Some(416), _) | (_, Some("InvalidRange")) => GatewayError::UnsatisfiableRange(format!(
            "backend rejected range for {}/{}",
            namespace, key
        )),
        (Some(status), _) if status >= 400 => {
            GatewayError::from_http_status(status, format!("{}/{}: {}", namespace, key, message))
        }
        _ => GatewayError::HttpError(message),
    }
}

#[async_trait]
impl StorageBackend for S3Storage {
    async fn put(&self, namespace: &str, key: &str, body: Bytes) -> Result<()> {
        debug!("S3 PutObject {}/{} ({} bytes)", namespace, key, body.len());
        self.client
            .put_object()
            .bucket(namespace)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| map_sdk_error(e, namespace, key))?;
        Ok(())
    }

    async fn get(&self, namespace: &str, key: &str, range: Option<ByteRange>) -> Result<PartialData> {
        debug!("S3 GetObject {}/{} range={:?}", namespace, key, range);
        let output = self
            .client
            .get_object()
            .bucket(namespace)
            .key(key)
            .set_range(range.map(|r| r.to_header()))
            .send()
            .await
            .map_err(|e| map_sdk_error(e, namespace, key))?;

        let content_range_total = output.content_range().and_then(total_from_content_range);
        let body = output
            .body
            .collect()
            .await
            .map_err(|e| {
                GatewayError::StorageError(format!(
                    "Failed to read body of {}/{}: {}",
                    namespace, key, e
                ))
            })?
            .into_bytes();

        match (range, content_range_total) {
            (Some(_), Some(total)) => Ok(PartialData::new(body, total)),
            // Store ignored the range and sent the whole object
            (Some(range), None) => {
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
        let output = self
            .client
            .head_object()
            .bucket(namespace)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, namespace, key))?;

        let total = output
            .content_length()
            .and_then(|len| u64::try_from(len).ok())
            .ok_or_else(|| {
                GatewayError::StorageError(format!(
                    "Content-Length missing or invalid for {}/{}",
                    namespace, key
                ))
            })?;
        let etag = output
            .e_tag()
            .map(|v| v.trim_matches('"').to_string())
            .ok_or_else(|| {
                GatewayError::StorageError(format!("ETag missing for {}/{}", namespace, key))
            })?;

        Ok(ObjectMetadata { etag, total })
    }

    /// S3 reports success for keys that do not exist
    async fn delete(&self, namespace: &str, key: &str) -> Result<()> {
        debug!("S3 DeleteObject {}/{}", namespace, key);
        self.client
            .delete_object()
            .bucket(namespace)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, namespace, key))?;
        Ok(())
    }

    /// Follows continuation tokens until the listing is exhausted
    async fn list_objects(&self, namespace: &str, prefix: &str) -> Result<Vec<String>> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(namespace)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut keys = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| map_sdk_error(e, namespace, prefix))?;
            keys.extend(
                page.contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_string)),
            );
        }
        Ok(keys)
    }
}
