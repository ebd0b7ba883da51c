//! MD5 content digests for ETags and `Content-MD5` validation

use crate::error::{GatewayError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use md5::{Digest, Md5};

/// Digest of an object body in the encodings S3 clients expect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Md5Digest {
    raw: [u8; 16],
    /// Lowercase hex digest, used as the ETag
    pub etag: String,
    /// Base64 of the raw digest, comparable to a `Content-MD5` header
    pub content_md5: String,
}

impl Md5Digest {
    /// Hash `data` once and derive both encodings from the result
    pub fn compute(data: &[u8]) -> Self {
        let mut raw = [0u8; 16];
        raw.copy_from_slice(&Md5::digest(data));
        Md5Digest {
            raw,
            etag: hex::encode(raw),
            content_md5: BASE64.encode(raw),
        }
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.raw
    }

    /// Check a client-supplied `Content-MD5` header against this digest
    ///
    /// # Returns
    /// * `Err(GatewayError::InvalidDigest)` if the header is not base64 of 16 bytes
    /// * `Err(GatewayError::ChecksumMismatch)` if it decodes to a different digest
    pub fn verify_content_md5(&self, header: &str) -> Result<()> {
        let header = header.trim();
        let decoded = BASE64
            .decode(header)
            .map_err(|e| GatewayError::InvalidDigest(format!("{}: {}", header, e)))?;

        if decoded.len() != self.raw.len() {
            return Err(GatewayError::InvalidDigest(format!(
                "expected 16 digest bytes, got {}",
                decoded.len()
            )));
        }

        if decoded.as_slice() != self.raw.as_slice() {
            return Err(GatewayError::ChecksumMismatch {
                expected: header.to_string(),
                computed: self.content_md5.clone(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        let digest = Md5Digest::compute(b"Hello, World!");
        assert_eq!(digest.etag, "65a8e27d8879283831b664bd8b7f0ad4");
        assert_eq!(digest.content_md5, "ZajifYh5KDgxtmS9i38K1A==");
    }

    #[test]
    fn test_empty_body() {
        let digest = Md5Digest::compute(b"");
        assert_eq!(digest.etag, "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn test_verify_content_md5() {
        let digest = Md5Digest::compute(b"Hello, World!");
        assert!(digest.verify_content_md5("ZajifYh5KDgxtmS9i38K1A==").is_ok());

        let other = Md5Digest::compute(b"something else");
        let err = digest.verify_content_md5(&other.content_md5).unwrap_err();
        assert!(matches!(err, GatewayError::ChecksumMismatch { .. }));

        let err = digest.verify_content_md5("not base64!").unwrap_err();
        assert!(matches!(err, GatewayError::InvalidDigest(_)));

        let err = digest.verify_content_md5("AAAA").unwrap_err();
        assert!(matches!(err, GatewayError::InvalidDigest(_)));
    }
}
