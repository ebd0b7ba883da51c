//! Footer caching for self-describing columnar file formats
//!
//! Readers of Parquet or Arrow files fetch the trailing metadata block
//! first and only then the column data they need. Caching that footer on
//! upload lets those first range reads skip the backing store.

use crate::error::Result;
use crate::models::ByteRange;
use crate::range_cache::RangeCache;
use bytes::Bytes;
use tracing::debug;

/// A file format whose trailing metadata region can be located from its bytes
pub trait FooterFormat: Send + Sync {
    /// Short name used in logs and metrics
    fn name(&self) -> &'static str;

    /// Signature the body must start with
    fn magic(&self) -> &'static [u8];

    /// Length of the trailing footer region of `body`, if it is well formed
    ///
    /// Only called when `body` starts with [`FooterFormat::magic`].
    fn footer_len(&self, body: &[u8]) -> Option<u64>;
}

/// Read a little-endian u32 at `offset` bytes before the end of `body`
fn trailer_u32(body: &[u8], offset: usize) -> Option<u32> {
    let start = body.len().checked_sub(offset)?;
    let bytes: [u8; 4] = body.get(start..start + 4)?.try_into().ok()?;
    Some(u32::from_le_bytes(bytes))
}

/// Parquet: `PAR1 <data> <metadata> <len: u32 LE> PAR1`
///
/// The cached region covers the metadata block plus the 8 byte trailer.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParquetFooter;

impl ParquetFooter {
    const MAGIC: &'static [u8] = b"PAR1";
    const TRAILER_LEN: usize = 8;
}

impl FooterFormat for ParquetFooter {
    fn name(&self) -> &'static str {
        "parquet"
    }

    fn magic(&self) -> &'static [u8] {
        Self::MAGIC
    }

    fn footer_len(&self, body: &[u8]) -> Option<u64> {
        if body.len() < Self::MAGIC.len() + Self::TRAILER_LEN || !body.ends_with(Self::MAGIC) {
            return None;
        }
        let metadata_len = trailer_u32(body, Self::TRAILER_LEN)? as usize;
        let footer_len = metadata_len + Self::TRAILER_LEN;
        if footer_len > body.len() - Self::MAGIC.len() {
            return None;
        }
        Some(footer_len as u64)
    }
}

/// Arrow IPC file: `ARROW1 <pad> <batches> <footer> <len: i32 LE> ARROW1`
///
/// The cached region covers the flatbuffer footer plus the 10 byte trailer.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArrowIpcFooter;

impl ArrowIpcFooter {
    const MAGIC: &'static [u8] = b"ARROW1";
    const TRAILER_LEN: usize = 10;
}

impl FooterFormat for ArrowIpcFooter {
    fn name(&self) -> &'static str {
        "arrow"
    }

    fn magic(&self) -> &'static [u8] {
        Self::MAGIC
    }

    fn footer_len(&self, body: &[u8]) -> Option<u64> {
        if body.len() < Self::MAGIC.len() + Self::TRAILER_LEN || !body.ends_with(Self::MAGIC) {
            return None;
        }
        let flatbuffer_len = trailer_u32(body, Self::TRAILER_LEN)? as usize;
        let footer_len = flatbuffer_len + Self::TRAILER_LEN;
        if footer_len > body.len() - Self::MAGIC.len() {
            return None;
        }
        Some(footer_len as u64)
    }
}

/// A footer found in an uploaded body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectedFooter {
    pub format: &'static str,
    pub range: ByteRange,
}

/// Decides which trailing byte range of an uploaded object gets cached
pub struct FooterCachePolicy {
    formats: Vec<Box<dyn FooterFormat>>,
}

impl Default for FooterCachePolicy {
    fn default() -> Self {
        FooterCachePolicy::new()
            .with_format(ParquetFooter)
            .with_format(ArrowIpcFooter)
    }
}

impl FooterCachePolicy {
    /// A policy recognizing no formats
    pub fn new() -> Self {
        FooterCachePolicy {
            formats: Vec::new(),
        }
    }

    /// Register an additional format
    pub fn with_format(mut self, format: impl FooterFormat + 'static) -> Self {
        self.formats.push(Box::new(format));
        self
    }

    /// Build a policy from format names, skipping unknown ones
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        names
            .iter()
            .fold(FooterCachePolicy::new(), |policy, name| match name.as_ref() {
                "parquet" => policy.with_format(ParquetFooter),
                "arrow" => policy.with_format(ArrowIpcFooter),
                _ => policy,
            })
    }

    pub fn format_names(&self) -> Vec<&'static str> {
        self.formats.iter().map(|f| f.name()).collect()
    }

    /// Locate the footer region of `body`, if any registered format matches
    pub fn detect(&self, body: &[u8]) -> Option<DetectedFooter> {
        let total = body.len() as u64;
        self.formats
            .iter()
            .filter(|format| body.starts_with(format.magic()))
            .find_map(|format| {
                let footer_len = format.footer_len(body)?;
                if footer_len == 0 {
                    return None;
                }
                let range = ByteRange::new(total - footer_len, Some(total - 1)).ok()?;
                Some(DetectedFooter {
                    format: format.name(),
                    range,
                })
            })
    }

    /// Cache the footer of a freshly written object
    ///
    /// Returns the detected footer, or `None` when no format applies.
    pub async fn apply(
        &self,
        cache: &RangeCache,
        id: &str,
        body: &Bytes,
    ) -> Result<Option<DetectedFooter>> {
        let detected = match self.detect(body) {
            Some(detected) => detected,
            None => {
                debug!("No footer format recognized for {}", id);
                return Ok(None);
            }
        };

        let start = detected.range.start;
        let end = detected.range.end.unwrap_or(start);
        cache
            .cache_range(
                id,
                body.slice(start as usize..=end as usize),
                start,
                end,
                body.len() as u64,
            )
            .await?;

        debug!(
            "Cached {} footer of {} at bytes {}",
            detected.format, id, detected.range
        );
        Ok(Some(detected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MemoryMetadata;
    use std::sync::Arc;

    fn parquet_body(data_len: usize, metadata: &[u8]) -> Vec<u8> {
        let mut body = b"PAR1".to_vec();
        body.extend(std::iter::repeat(0xAB).take(data_len));
        body.extend_from_slice(metadata);
        body.extend_from_slice(&(metadata.len() as u32).to_le_bytes());
        body.extend_from_slice(b"PAR1");
        body
    }

    #[test]
    fn test_detects_parquet_footer() {
        let body = parquet_body(100, b"file-metadata");
        let total = body.len() as u64;
        let detected = FooterCachePolicy::default().detect(&body).unwrap();
        assert_eq!(detected.format, "parquet");
        assert_eq!(detected.range.start, total - 13 - 8);
        assert_eq!(detected.range.end, Some(total - 1));
    }

    #[test]
    fn test_detects_arrow_footer() {
        let mut body = b"ARROW1\0\0".to_vec();
        body.extend_from_slice(&[1u8; 64]);
        body.extend_from_slice(b"flatbuf");
        body.extend_from_slice(&7u32.to_le_bytes());
        body.extend_from_slice(b"ARROW1");

        let detected = FooterCachePolicy::default().detect(&body).unwrap();
        assert_eq!(detected.format, "arrow");
        assert_eq!(detected.range.start, body.len() as u64 - 17);
    }

    #[test]
    fn test_ignores_other_and_corrupt_bodies() {
        let policy = FooterCachePolicy::default();
        assert!(policy.detect(b"Hello, World!").is_none());
        assert!(policy.detect(b"PAR1").is_none());

        // footer length larger than the body
        let mut body = b"PAR1xxxx".to_vec();
        body.extend_from_slice(&1000u32.to_le_bytes());
        body.extend_from_slice(b"PAR1");
        assert!(policy.detect(&body).is_none());

        // truncated upload without trailing magic
        let body = parquet_body(10, b"meta");
        assert!(policy.detect(&body[..body.len() - 1]).is_none());
    }

    #[test]
    fn test_policy_without_formats() {
        let body = parquet_body(10, b"meta");
        assert!(FooterCachePolicy::new().detect(&body).is_none());
        assert!(FooterCachePolicy::from_names(&["orc"]).detect(&body).is_none());
        assert_eq!(
            FooterCachePolicy::from_names(&["parquet"]).format_names(),
            vec!["parquet"]
        );
    }

    #[tokio::test]
    async fn test_apply_populates_cache() {
        let cache = RangeCache::new(Arc::new(MemoryMetadata::new()));
        let body = Bytes::from(parquet_body(50, b"schema"));
        let total = body.len() as u64;

        let detected = FooterCachePolicy::default()
            .apply(&cache, "bucket/file.parquet", &body)
            .await
            .unwrap()
            .unwrap();

        let hit = cache
            .get_cached_range("bucket/file.parquet", detected.range.start, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.total, total);
        assert_eq!(&hit.data[..6], b"schema");
        assert!(hit.data.ends_with(b"PAR1"));

        // the 8 byte trailer read parquet readers issue first
        let trailer = cache
            .get_cached_range("bucket/file.parquet", total - 8, Some(total))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(trailer.data.len(), 8);
    }
}
