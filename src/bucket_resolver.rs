//! Resolution of inbound requests to a bucket and key

use crate::models::ObjectPath;
use tracing::debug;

/// Maps a request's host header and path to an [`ObjectPath`]
///
/// Requests addressed to the configured canonical host are path-style
/// (`/{bucket}/{key}`); any other host is virtual-hosted-style
/// (`{bucket}.s3.example.com/{key}`).
#[derive(Debug, Clone)]
pub struct BucketResolver {
    canonical_host: String,
}

impl BucketResolver {
    pub fn new(canonical_host: impl Into<String>) -> Self {
        BucketResolver {
            canonical_host: canonical_host.into(),
        }
    }

    pub fn canonical_host(&self) -> &str {
        &self.canonical_host
    }

    /// Resolve `host` and `path` (everything after the API prefix)
    ///
    /// Never fails: a path-style path without a slash yields an empty key.
    pub fn resolve(&self, host: &str, path: &str) -> ObjectPath {
        let host = strip_port(host);

        let object = if host == self.canonical_host {
            match path.split_once('/') {
                Some((bucket, key)) => ObjectPath::new(bucket, key),
                None => ObjectPath::new(path, ""),
            }
        } else {
            let bucket = host.split('.').next().unwrap_or(host);
            ObjectPath::new(bucket, path)
        };

        debug!(
            "Resolved host={} path={} to bucket={} key={}",
            host, path, object.bucket, object.key
        );
        object
    }
}

fn strip_port(host: &str) -> &str {
    match host.split_once(':') {
        Some((name, _port)) => name,
        None => host,
    }
}
