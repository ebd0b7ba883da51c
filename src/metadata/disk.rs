//! Filesystem metadata backend
//!
//! Each key is stored as one file. File names are the xxh3-128 hash of the
//! key, spread over a two-level `XX/YY/` directory layout so no single
//! directory grows too large.

use super::MetadataBackend;
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::fs;
use tracing::{debug, info};
use xxhash_rust::xxh3::xxh3_128;

/// Metadata backend persisting values under a base directory
#[derive(Debug)]
pub struct DiskMetadata {
    base_path: PathBuf,
}

impl DiskMetadata {
    /// Open (creating if needed) a metadata store rooted at `base_path`
    pub async fn new(base_path: impl AsRef<Path>) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).await.map_err(|e| {
            GatewayError::MetadataError(format!(
                "Failed to create metadata directory {}: {}",
                base_path.display(),
                e
            ))
        })?;
        info!("Disk metadata store at {}", base_path.display());

        Ok(DiskMetadata { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn file_path(&self, key: &str) -> PathBuf {
        let hash = xxh3_128(key.as_bytes());
        let dir1 = format!("{:02x}", (hash >> 8) & 0xFF);
        let dir2 = format!("{:02x}", hash & 0xFF);
        self.base_path
            .join(dir1)
            .join(dir2)
            .join(format!("{:032x}", hash))
    }
}

#[async_trait]
impl MetadataBackend for DiskMetadata {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let path = self.file_path(key);
        match fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(GatewayError::MetadataError(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Writes go to a uniquely named temporary file in the target directory
    /// which is then renamed over the target, so readers see either the old
    /// or the new value even with several processes sharing the directory.
    async fn put(&self, key: &str, value: Bytes) -> Result<()> {
        let path = self.file_path(key);
        let parent = path
            .parent()
            .ok_or_else(|| GatewayError::InternalError("metadata path has no parent".to_string()))?
            .to_path_buf();
        fs::create_dir_all(&parent).await.map_err(|e| {
            GatewayError::MetadataError(format!("Failed to create {}: {}", parent.display(), e))
        })?;

        let data = value.clone();
        tokio::task::spawn_blocking(move || write_atomically(&parent, &path, &data))
            .await
            .map_err(|e| GatewayError::InternalError(format!("metadata write task failed: {}", e)))??;

        debug!("Wrote metadata key {} ({} bytes)", key, value.len());
        Ok(())
    }
}

/// Write `data` to a fresh temp file in `dir` and persist it as `target`
///
/// The temp file is removed if anything fails before the rename.
fn write_atomically(dir: &Path, target: &Path, data: &[u8]) -> Result<()> {
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| {
        GatewayError::MetadataError(format!("Failed to create temp file in {}: {}", dir.display(), e))
    })?;
    tmp.write_all(data).map_err(|e| {
        GatewayError::MetadataError(format!("Failed to write {}: {}", tmp.path().display(), e))
    })?;
    tmp.persist(target).map_err(|e| {
        GatewayError::MetadataError(format!(
            "Failed to move {} into place: {}",
            target.display(),
            e.error
        ))
    })?;
    Ok(())
}
