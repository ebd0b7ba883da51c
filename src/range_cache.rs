//! Single-slot byte range cache
//!
//! Each object identity owns at most one cached contiguous byte range,
//! kept in a [`MetadataBackend`] under two keys:
//!
//! - `range/{id}` holds the descriptor `"{start}-{end}/{total}"` (end inclusive)
//! - `data/{id}/{start}-{end}` holds the cached bytes for those bounds
//!
//! The two writes are not atomic. Concurrent writers or a cancelled write
//! can leave a descriptor pointing at data that was never stored, or at
//! data of a different length. Every lookup treats such a state as a miss.

use crate::error::{GatewayError, Result};
use crate::metadata::MetadataBackend;
use crate::models::{PartialData, RangeDescriptor};
use bytes::Bytes;
use std::sync::Arc;
use tracing::debug;

/// Range cache built on an opaque metadata store
#[derive(Clone)]
pub struct RangeCache {
    backend: Arc<dyn MetadataBackend>,
}

impl RangeCache {
    pub fn new(backend: Arc<dyn MetadataBackend>) -> Self {
        RangeCache { backend }
    }

    fn descriptor_key(id: &str) -> String {
        format!("range/{}", id)
    }

    fn data_key(id: &str, start: u64, end: u64) -> String {
        format!("data/{}/{}-{}", id, start, end)
    }

    /// Cache `data` as bytes `start..=end` of an object of size `total`
    ///
    /// Replaces whatever range was cached for `id` before. Data stored
    /// under earlier bounds is left orphaned.
    pub async fn cache_range(
        &self,
        id: &str,
        data: Bytes,
        start: u64,
        end: u64,
        total: u64,
    ) -> Result<()> {
        let descriptor = RangeDescriptor::new(start, end, total)?;
        if data.len() as u64 != descriptor.size() {
            return Err(GatewayError::InvalidRange(format!(
                "cached data is {} bytes but range {}-{} covers {}",
                data.len(),
                start,
                end,
                descriptor.size()
            )));
        }

        self.backend
            .put(&Self::descriptor_key(id), Bytes::from(descriptor.encode()))
            .await?;
        self.backend
            .put(&Self::data_key(id, start, end), data)
            .await?;

        debug!("Cached range {} for {}", descriptor.encode(), id);
        Ok(())
    }

    /// Serve `request_start..request_end` (end exclusive) from the cache
    ///
    /// `request_end == None` asks for everything through the end of the
    /// object, which can only be served when the cached range reaches the
    /// last byte. Returns `Ok(None)` on any miss; the cache never serves a
    /// request that extends past its stored bounds.
    pub async fn get_cached_range(
        &self,
        id: &str,
        request_start: u64,
        request_end: Option<u64>,
    ) -> Result<Option<PartialData>> {
        let raw = match self.backend.get(&Self::descriptor_key(id)).await? {
            Some(raw) => raw,
            None => return Ok(None),
        };

        let descriptor = match RangeDescriptor::decode(&raw) {
            Some(descriptor) => descriptor,
            None => {
                debug!("Ignoring empty or unreadable range descriptor for {}", id);
                return Ok(None);
            }
        };

        let effective_end = match request_end {
            Some(end) => end,
            None if descriptor.reaches_end() => descriptor.total,
            None => {
                debug!(
                    "Cached range {} for {} does not reach the end of the object",
                    descriptor.encode(),
                    id
                );
                return Ok(None);
            }
        };

        if request_start >= effective_end
            || request_start < descriptor.start
            || effective_end > descriptor.end + 1
        {
            debug!(
                "Request {}..{} for {} outside cached range {}",
                request_start,
                effective_end,
                id,
                descriptor.encode()
            );
            return Ok(None);
        }

        let data = match self
            .backend
            .get(&Self::data_key(id, descriptor.start, descriptor.end))
            .await?
        {
            Some(data) => data,
            None => {
                debug!("Range descriptor for {} has no data, treating as miss", id);
                return Ok(None);
            }
        };

        if data.len() as u64 != descriptor.size() {
            debug!(
                "Cached data for {} is {} bytes, descriptor expects {}",
                id,
                data.len(),
                descriptor.size()
            );
            return Ok(None);
        }

        let data = if request_start != descriptor.start || effective_end != descriptor.end + 1 {
            let from = (request_start - descriptor.start) as usize;
            let to = (effective_end - descriptor.start) as usize;
            data.slice(from..to)
        } else {
            data
        };

        Ok(Some(PartialData::new(data, descriptor.total)))
    }

    /// Drop the cached range for `id` so later lookups miss
    ///
    /// The metadata store has no delete, so the descriptor is overwritten
    /// with an empty value.
    pub async fn invalidate(&self, id: &str) -> Result<()> {
        self.backend
            .put(&Self::descriptor_key(id), Bytes::new())
            .await?;
        debug!("Invalidated cached range for {}", id);
        Ok(())
    }
}
