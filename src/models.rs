//! Core data models for the S4 gateway

use crate::error::{GatewayError, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A requested byte range of an object
///
/// `end` is inclusive; `None` means "through the end of the object".
/// `ByteRange::default()` (start 0, no end) denotes the whole object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ByteRange {
    /// Starting byte position (inclusive)
    pub start: u64,
    /// Ending byte position (inclusive), `None` when open-ended
    pub end: Option<u64>,
}

impl ByteRange {
    /// Create a new ByteRange
    ///
    /// # Returns
    /// * `Ok(ByteRange)` if the range is valid
    /// * `Err(GatewayError::InvalidRange)` if `end < start`
    pub fn new(start: u64, end: Option<u64>) -> Result<Self> {
        if let Some(end) = end {
            if end < start {
                return Err(GatewayError::InvalidRange(format!(
                    "start ({}) must be <= end ({})",
                    start, end
                )));
            }
        }
        Ok(ByteRange { start, end })
    }

    /// The range covering the entire object
    pub fn full() -> Self {
        ByteRange::default()
    }

    /// Whether this is a true range request rather than the whole object
    pub fn is_range_request(&self) -> bool {
        self.start > 0 || self.end.is_some()
    }

    /// Exclusive end offset, `None` when open-ended
    ///
    /// Saturates at `u64::MAX`, which no object can reach.
    pub fn end_exclusive(&self) -> Option<u64> {
        self.end.map(|end| end.saturating_add(1))
    }

    /// Parse an optional HTTP `Range` header value
    ///
    /// A missing header yields the whole-object range. Only a single
    /// `bytes=start-end` range is accepted; either side may be empty.
    pub fn from_optional_header(header: Option<&str>) -> Result<Self> {
        match header {
            Some(value) => ByteRange::from_header(value),
            None => Ok(ByteRange::full()),
        }
    }

    /// Parse a ByteRange from an HTTP Range header value
    ///
    /// # Arguments
    /// * `header` - The Range header value (e.g., "bytes=0-1023", "bytes=-8", "bytes=100-")
    ///
    /// # Returns
    /// * `Ok(ByteRange)` if parsing succeeds
    /// * `Err(GatewayError::MalformedRange)` if the header format is invalid
    pub fn from_header(header: &str) -> Result<Self> {
        let header = header.trim();

        let range_part = header.strip_prefix("bytes=").ok_or_else(|| {
            GatewayError::MalformedRange(format!(
                "Range header must start with 'bytes=', got: {}",
                header
            ))
        })?;

        if range_part.contains(',') {
            return Err(GatewayError::MalformedRange(format!(
                "multiple ranges are not supported, got: {}",
                range_part
            )));
        }

        let (start, end) = range_part.split_once('-').ok_or_else(|| {
            GatewayError::MalformedRange(format!(
                "Invalid range format, expected 'start-end', got: {}",
                range_part
            ))
        })?;

        let start = match start.trim() {
            "" => 0,
            value => value.parse::<u64>().map_err(|e| {
                GatewayError::MalformedRange(format!("Invalid start value '{}': {}", value, e))
            })?,
        };

        let end = match end.trim() {
            "" => None,
            value => Some(value.parse::<u64>().map_err(|e| {
                GatewayError::MalformedRange(format!("Invalid end value '{}': {}", value, e))
            })?),
        };

        ByteRange::new(start, end).map_err(|e| GatewayError::MalformedRange(e.to_string()))
    }

    /// Convert this ByteRange to an HTTP Range header value
    pub fn to_header(&self) -> String {
        match self.end {
            Some(end) => format!("bytes={}-{}", self.start, end),
            None => format!("bytes={}-", self.start),
        }
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "{}-{}", self.start, end),
            None => write!(f, "{}-", self.start),
        }
    }
}

/// Bucket and key an inbound request addresses
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectPath {
    pub bucket: String,
    pub key: String,
}

impl ObjectPath {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        ObjectPath {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Identity string used for range cache keys
    pub fn cache_key(&self) -> String {
        format!("{}/{}", self.bucket, self.key)
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Metadata reported by the storage backend for a whole object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    /// Hex content digest
    pub etag: String,
    /// Total size of the object in bytes
    pub total: u64,
}

/// Bytes returned by a read, together with the full object size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialData {
    pub data: Bytes,
    /// Full logical size of the object, independent of `data.len()`
    pub total: u64,
}

impl PartialData {
    pub fn new(data: impl Into<Bytes>, total: u64) -> Self {
        PartialData {
            data: data.into(),
            total,
        }
    }

    /// `Content-Range` value for this data served from offset `start`
    pub fn content_range(&self, start: u64) -> String {
        if self.data.is_empty() {
            return format!("bytes */{}", self.total);
        }
        let last = start + self.data.len() as u64 - 1;
        format!("bytes {}-{}/{}", start, last, self.total)
    }
}

/// Bounds of the single cached slice held for an object
///
/// Serialized as `"{start}-{end}/{total}"` with `end` inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeDescriptor {
    pub start: u64,
    pub end: u64,
    pub total: u64,
}

impl RangeDescriptor {
    pub fn new(start: u64, end: u64, total: u64) -> Result<Self> {
        if end < start {
            return Err(GatewayError::InvalidRange(format!(
                "start ({}) must be <= end ({})",
                start, end
            )));
        }
        if end >= total {
            return Err(GatewayError::InvalidRange(format!(
                "end ({}) must be < total ({})",
                end, total
            )));
        }
        Ok(RangeDescriptor { start, end, total })
    }

    /// Number of bytes covered by the descriptor
    pub fn size(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Whether the cached slice extends to the last byte of the object
    pub fn reaches_end(&self) -> bool {
        self.end + 1 == self.total
    }

    pub fn encode(&self) -> String {
        format!("{}-{}/{}", self.start, self.end, self.total)
    }

    /// Parse a serialized descriptor, `None` on any inconsistency
    pub fn decode(raw: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(raw).ok()?;
        let (bounds, total) = text.split_once('/')?;
        let (start, end) = bounds.split_once('-')?;
        RangeDescriptor::new(
            start.parse().ok()?,
            end.parse().ok()?,
            total.parse().ok()?,
        )
        .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_range_new() {
        let range = ByteRange::new(0, Some(1023)).unwrap();
        assert_eq!(range.start, 0);
        assert_eq!(range.end, Some(1023));
        assert_eq!(range.end_exclusive(), Some(1024));
    }

    #[test]
    fn test_end_exclusive_saturates() {
        let range = ByteRange::from_header("bytes=2-18446744073709551615").unwrap();
        assert_eq!(range.end, Some(u64::MAX));
        assert_eq!(range.end_exclusive(), Some(u64::MAX));
    }

    #[test]
    fn test_byte_range_invalid() {
        assert!(ByteRange::new(100, Some(50)).is_err());
        assert!(ByteRange::new(100, None).is_ok());
    }

    #[test]
    fn test_from_header_forms() {
        assert_eq!(
            ByteRange::from_header("bytes=0-1023").unwrap(),
            ByteRange { start: 0, end: Some(1023) }
        );
        assert_eq!(
            ByteRange::from_header("bytes=-8").unwrap(),
            ByteRange { start: 0, end: Some(8) }
        );
        assert_eq!(
            ByteRange::from_header("bytes=100-").unwrap(),
            ByteRange { start: 100, end: None }
        );
        assert_eq!(ByteRange::from_header("bytes=-").unwrap(), ByteRange::full());
    }

    #[test]
    fn test_from_header_rejects_garbage() {
        for header in [
            "items=0-1",
            "0-1",
            "bytes=a-1",
            "bytes=1-b",
            "bytes=5",
            "bytes=0-1,3-4",
            "bytes=9-2",
        ] {
            let err = ByteRange::from_header(header).unwrap_err();
            assert!(
                matches!(err, GatewayError::MalformedRange(_)),
                "{} should be malformed",
                header
            );
        }
    }

    #[test]
    fn test_missing_header_is_whole_object() {
        let range = ByteRange::from_optional_header(None).unwrap();
        assert_eq!(range, ByteRange::full());
        assert!(!range.is_range_request());
        assert!(ByteRange::new(0, Some(0)).unwrap().is_range_request());
        assert!(ByteRange::new(1, None).unwrap().is_range_request());
    }

    #[test]
    fn test_to_header() {
        assert_eq!(ByteRange::new(0, Some(9)).unwrap().to_header(), "bytes=0-9");
        assert_eq!(ByteRange::new(7, None).unwrap().to_header(), "bytes=7-");
    }

    #[test]
    fn test_object_path_cache_key() {
        let path = ObjectPath::new("bucket", "path/to/key");
        assert_eq!(path.cache_key(), "bucket/path/to/key");
    }

    #[test]
    fn test_content_range() {
        let data = PartialData::new(vec![0u8; 10], 100);
        assert_eq!(data.content_range(90), "bytes 90-99/100");
        let empty = PartialData::new(Vec::new(), 100);
        assert_eq!(empty.content_range(0), "bytes */100");
    }

    #[test]
    fn test_descriptor_encode_decode() {
        let desc = RangeDescriptor::new(90, 99, 100).unwrap();
        assert_eq!(desc.encode(), "90-99/100");
        assert_eq!(RangeDescriptor::decode(b"90-99/100"), Some(desc));
        assert!(desc.reaches_end());
        assert_eq!(desc.size(), 10);
    }

    #[test]
    fn test_descriptor_decode_rejects_inconsistent() {
        assert_eq!(RangeDescriptor::decode(b""), None);
        assert_eq!(RangeDescriptor::decode(b"garbage"), None);
        assert_eq!(RangeDescriptor::decode(b"10-5/100"), None);
        assert_eq!(RangeDescriptor::decode(b"0-100/100"), None);
    }
}
