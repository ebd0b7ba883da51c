//! Error types for the S4 gateway

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Error types that can occur while serving gateway requests
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Malformed Range header: {0}")]
    MalformedRange(String),

    #[error("Invalid byte range: {0}")]
    InvalidRange(String),

    #[error("Unsatisfiable range: {0}")]
    UnsatisfiableRange(String),

    #[error("Content-MD5 mismatch: expected {expected}, computed {computed}")]
    ChecksumMismatch { expected: String, computed: String },

    #[error("Invalid Content-MD5 header: {0}")]
    InvalidDigest(String),

    #[error("Request body exceeds the maximum object size of {limit} bytes")]
    EntityTooLarge { limit: u64 },

    #[error("No such key: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Metadata error: {0}")]
    MetadataError(String),

    #[error("Backend returned 4xx error: {status} - {message}")]
    OriginClientError { status: u16, message: String },

    #[error("Backend returned 5xx error: {status} - {message}")]
    OriginServerError { status: u16, message: String },

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("Network timeout: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        GatewayError::IoError(err.to_string())
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout(err.to_string())
        } else {
            GatewayError::HttpError(err.to_string())
        }
    }
}

impl GatewayError {
    /// Convert error to HTTP status code
    ///
    /// Client mistakes (bad ranges, bad digests) map to 4xx, backend
    /// failures map to 502/504 and local faults to 500.
    pub fn to_http_status(&self) -> u16 {
        match self {
            GatewayError::InvalidRequest(_) => 400,
            GatewayError::MalformedRange(_) => 400,
            GatewayError::InvalidRange(_) => 400,
            GatewayError::ChecksumMismatch { .. } => 400,
            GatewayError::InvalidDigest(_) => 400,
            GatewayError::NotFound { .. } => 404,
            GatewayError::EntityTooLarge { .. } => 413,
            GatewayError::UnsatisfiableRange(_) => 416,

            // Pass through 4xx errors from the backing store
            GatewayError::OriginClientError { status, .. } => *status,
            GatewayError::OriginServerError { .. } => 502,
            GatewayError::StorageError(_) => 502,
            GatewayError::HttpError(_) => 502,
            GatewayError::Timeout(_) => 504,

            GatewayError::ConfigError(_) => 500,
            GatewayError::MetadataError(_) => 500,
            GatewayError::IoError(_) => 500,
            GatewayError::InternalError(_) => 500,
        }
    }

    /// S3-style error code used in error response bodies
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::InvalidRequest(_) => "InvalidRequest",
            GatewayError::MalformedRange(_) => "InvalidArgument",
            GatewayError::InvalidRange(_) => "InvalidArgument",
            GatewayError::ChecksumMismatch { .. } => "BadDigest",
            GatewayError::InvalidDigest(_) => "InvalidDigest",
            GatewayError::NotFound { .. } => "NoSuchKey",
            GatewayError::EntityTooLarge { .. } => "EntityTooLarge",
            GatewayError::UnsatisfiableRange(_) => "InvalidRange",
            GatewayError::OriginClientError { .. } => "BackendClientError",
            GatewayError::OriginServerError { .. }
            | GatewayError::StorageError(_)
            | GatewayError::HttpError(_) => "BadGateway",
            GatewayError::Timeout(_) => "GatewayTimeout",
            _ => "InternalError",
        }
    }

    /// Whether the error is the client's fault (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.to_http_status())
    }

    /// Create an OriginClientError from a status code and message
    pub fn origin_client_error(status: u16, message: impl Into<String>) -> Self {
        GatewayError::OriginClientError {
            status,
            message: message.into(),
        }
    }

    /// Create an OriginServerError from a status code and message
    pub fn origin_server_error(status: u16, message: impl Into<String>) -> Self {
        GatewayError::OriginServerError {
            status,
            message: message.into(),
        }
    }

    /// Create an error from a backend HTTP status code
    ///
    /// Automatically categorizes as 4xx or 5xx error
    pub fn from_http_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if (400..500).contains(&status) {
            GatewayError::origin_client_error(status, message)
        } else if (500..600).contains(&status) {
            GatewayError::origin_server_error(status, message)
        } else {
            GatewayError::HttpError(format!("HTTP {}: {}", status, message))
        }
    }
}
