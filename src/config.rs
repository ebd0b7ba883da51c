//! Configuration management for the S4 gateway

use crate::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;

/// Configuration for the gateway process
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayConfig {
    /// Address the HTTP server binds to (default: "0.0.0.0:8000")
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Canonical host of the gateway (default: "127.0.0.1")
    ///
    /// Requests whose Host header equals this value use path-style
    /// addressing; any other host is treated as `{bucket}.{domain}`.
    #[serde(default = "default_host")]
    pub host: String,

    /// Path prefix of the object API (default: "/api/s3")
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Largest accepted upload body in bytes (default: 5GB)
    #[serde(default = "default_max_object_size")]
    pub max_object_size: u64,

    /// Log level used when RUST_LOG is not set (default: "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Backing object store
    #[serde(default)]
    pub storage: StorageConfig,

    /// Metadata store holding the range cache
    #[serde(default)]
    pub metadata: MetadataConfig,

    /// Footer caching on upload
    #[serde(default)]
    pub footer_cache: FooterCacheConfig,
}

/// Configuration for the backing object store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// Backend type: "memory", "http" or "s3" (default: "memory")
    #[serde(default = "default_storage_backend")]
    pub backend: String,

    /// Base URL of the S3-compatible endpoint
    ///
    /// Required for "http". Optional for "s3", where it switches the
    /// client to path-style requests against that endpoint.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Request timeout in seconds for the "http" and "s3" backends (default: 30)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Signing region for the "s3" backend (default: "us-east-1")
    #[serde(default = "default_region")]
    pub region: String,

    /// Static access key for the "s3" backend
    ///
    /// When both keys are absent the AWS default credential chain is used.
    #[serde(default)]
    pub access_key_id: Option<String>,

    /// Static secret key for the "s3" backend
    #[serde(default)]
    pub secret_access_key: Option<String>,
}

/// Configuration for the metadata store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetadataConfig {
    /// Backend type: "memory", "disk", "redis" or "noop" (default: "memory")
    #[serde(default = "default_metadata_backend")]
    pub backend: String,

    /// Directory for the "disk" backend (default: /var/cache/s4-gateway)
    #[serde(default = "default_metadata_directory")]
    pub directory: String,

    /// Server URL for the "redis" backend (default: "redis://localhost")
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Prefix namespacing keys in the "redis" backend (default: none)
    #[serde(default)]
    pub key_prefix: String,
}

/// Configuration for footer caching
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FooterCacheConfig {
    /// Whether uploads are inspected for footers (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Recognized formats (default: ["parquet", "arrow"])
    #[serde(default = "default_footer_formats")]
    pub formats: Vec<String>,
}

const KNOWN_FOOTER_FORMATS: &[&str] = &["parquet", "arrow"];

// Default value functions for serde
fn default_listen_address() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_api_prefix() -> String {
    "/api/s3".to_string()
}

fn default_max_object_size() -> u64 {
    5 * 1024 * 1024 * 1024 // 5GB
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_storage_backend() -> String {
    "memory".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_metadata_backend() -> String {
    "memory".to_string()
}

fn default_metadata_directory() -> String {
    "/var/cache/s4-gateway".to_string()
}

fn default_redis_url() -> String {
    crate::metadata::redis::DEFAULT_REDIS_URL.to_string()
}

fn default_true() -> bool {
    true
}

fn default_footer_formats() -> Vec<String> {
    KNOWN_FOOTER_FORMATS.iter().map(|f| f.to_string()).collect()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            endpoint: None,
            timeout_secs: default_timeout_secs(),
            region: default_region(),
            access_key_id: None,
            secret_access_key: None,
        }
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            backend: default_metadata_backend(),
            directory: default_metadata_directory(),
            url: default_redis_url(),
            key_prefix: String::new(),
        }
    }
}

impl Default for FooterCacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            formats: default_footer_formats(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            listen_address: default_listen_address(),
            host: default_host(),
            api_prefix: default_api_prefix(),
            max_object_size: default_max_object_size(),
            log_level: default_log_level(),
            storage: StorageConfig::default(),
            metadata: MetadataConfig::default(),
            footer_cache: FooterCacheConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from a YAML file
    ///
    /// # Returns
    /// * `Ok(GatewayConfig)` if loading and validation succeed
    /// * `Err(GatewayError)` if file cannot be read or config is invalid
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            GatewayError::ConfigError(format!("Failed to read config file: {}", e))
        })?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from a YAML string
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: GatewayConfig = serde_yaml::from_str(content).map_err(|e| {
            GatewayError::ConfigError(format!("Failed to parse config file: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Parsed listen address
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen_address.parse().map_err(|e| {
            GatewayError::ConfigError(format!(
                "Invalid listen_address '{}': {}",
                self.listen_address, e
            ))
        })
    }

    /// Validate the configuration
    ///
    /// # Validation Rules
    /// - listen_address must be a socket address
    /// - host must not be empty or carry a port
    /// - api_prefix must start with '/' and not end with '/'
    /// - max_object_size must be > 0
    /// - storage.backend must be "memory", "http" or "s3"
    /// - "http" needs an endpoint
    /// - "s3" needs a region and either both static keys or neither
    /// - metadata.backend must be "memory", "disk", "redis" or "noop"
    /// - footer_cache.formats must only name known formats
    pub fn validate(&self) -> Result<()> {
        self.listen_addr()?;

        if self.host.is_empty() {
            return Err(GatewayError::ConfigError(
                "host must not be empty".to_string(),
            ));
        }
        if self.host.contains(':') {
            return Err(GatewayError::ConfigError(format!(
                "host must not include a port, got '{}'",
                self.host
            )));
        }

        if !self.api_prefix.starts_with('/') || self.api_prefix.ends_with('/') {
            return Err(GatewayError::ConfigError(format!(
                "api_prefix must start with '/' and must not end with '/', got '{}'",
                self.api_prefix
            )));
        }

        if self.max_object_size == 0 {
            return Err(GatewayError::ConfigError(
                "max_object_size must be greater than 0".to_string(),
            ));
        }

        match self.storage.backend.as_str() {
            "memory" => {}
            "http" => {
                if self.storage.endpoint.as_deref().map_or(true, str::is_empty) {
                    return Err(GatewayError::ConfigError(
                        "storage.endpoint is required when storage.backend is 'http'"
                            .to_string(),
                    ));
                }
                if self.storage.timeout_secs == 0 {
                    return Err(GatewayError::ConfigError(
                        "storage.timeout_secs must be greater than 0".to_string(),
                    ));
                }
            }
            "s3" => {
                if self.storage.region.is_empty() {
                    return Err(GatewayError::ConfigError(
                        "storage.region must not be empty for the 's3' backend".to_string(),
                    ));
                }
                if self.storage.endpoint.as_deref() == Some("") {
                    return Err(GatewayError::ConfigError(
                        "storage.endpoint must not be empty when set".to_string(),
                    ));
                }
                if self.storage.access_key_id.is_some() != self.storage.secret_access_key.is_some()
                {
                    return Err(GatewayError::ConfigError(
                        "storage.access_key_id and storage.secret_access_key must be set together"
                            .to_string(),
                    ));
                }
                if self.storage.timeout_secs == 0 {
                    return Err(GatewayError::ConfigError(
                        "storage.timeout_secs must be greater than 0".to_string(),
                    ));
                }
            }
            other => {
                return Err(GatewayError::ConfigError(format!(
                    "Invalid storage.backend '{}', must be 'memory', 'http' or 's3'",
                    other
                )));
            }
        }

        match self.metadata.backend.as_str() {
            "memory" | "noop" => {}
            "disk" => {
                if self.metadata.directory.is_empty() {
                    return Err(GatewayError::ConfigError(
                        "metadata.directory must not be empty for the 'disk' backend"
                            .to_string(),
                    ));
                }
            }
            "redis" => {
                if self.metadata.url.is_empty() {
                    return Err(GatewayError::ConfigError(
                        "metadata.url must not be empty for the 'redis' backend".to_string(),
                    ));
                }
            }
            other => {
                return Err(GatewayError::ConfigError(format!(
                    "Invalid metadata.backend '{}', must be 'memory', 'disk', 'redis' or 'noop'",
                    other
                )));
            }
        }

        if let Some(unknown) = self
            .footer_cache
            .formats
            .iter()
            .find(|f| !KNOWN_FOOTER_FORMATS.contains(&f.as_str()))
        {
            return Err(GatewayError::ConfigError(format!(
                "Unknown footer_cache format '{}', known formats: {:?}",
                unknown, KNOWN_FOOTER_FORMATS
            )));
        }

        Ok(())
    }
}
