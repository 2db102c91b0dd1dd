//! # Result Cache
//!
//! Writes processed images to uniquely named local files so the display layer
//! can load them by path.

use crate::session::ProcessedArtifact;
use crate::{CoreError, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

const FILE_PREFIX: &str = "swap-";
const FILE_SUFFIX: &str = ".jpg";

/// A materialized result the display layer can read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalResource {
    pub path: PathBuf,
    pub size: u64,
}

impl LocalResource {
    pub fn uri(&self) -> String {
        format!("file://{}", self.path.display())
    }
}

#[derive(Debug, Clone)]
pub struct ResultCache {
    dir: PathBuf,
}

impl ResultCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<platform cache dir>/emojiswap/results`
    pub fn default_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("emojiswap")
            .join("results")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Timestamp, sequence number and a random suffix keep names unique even
    /// across sessions that reuse sequence numbers.
    fn file_name_for(artifact: &ProcessedArtifact) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!(
            "{}{}-{:06}-{}{}",
            FILE_PREFIX,
            Utc::now().format("%Y%m%dT%H%M%S%3f"),
            artifact.seq,
            &suffix[..8],
            FILE_SUFFIX
        )
    }

    /// Write the artifact bytes and return where they landed.
    ///
    /// Bytes go to a hidden temp file first and are renamed into place, so a
    /// reader never sees a half-written image.
    pub async fn materialize(&self, artifact: &ProcessedArtifact) -> Result<LocalResource> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| storage_error(&self.dir, e))?;

        let name = Self::file_name_for(artifact);
        let path = self.dir.join(&name);
        let partial = self.dir.join(format!(".{}.part", name));

        tokio::fs::write(&partial, &artifact.bytes)
            .await
            .map_err(|e| storage_error(&partial, e))?;
        tokio::fs::rename(&partial, &path)
            .await
            .map_err(|e| storage_error(&path, e))?;

        debug!(seq = artifact.seq, "Materialized result at {:?}", path);
        Ok(LocalResource {
            path,
            size: artifact.bytes.len() as u64,
        })
    }

    /// Remove a file nothing will display
    pub async fn discard(&self, resource: &LocalResource) {
        match tokio::fs::remove_file(&resource.path).await {
            Ok(()) => debug!("Discarded {:?}", resource.path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to delete {:?}: {}", resource.path, e),
        }
    }

    /// Materialized files, oldest first
    pub async fn entries(&self) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(entries),
            Err(e) => return Err(storage_error(&self.dir, e)),
        };

        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(FILE_PREFIX) && name.ends_with(FILE_SUFFIX) {
                entries.push(entry.path());
            }
        }
        entries.sort();
        Ok(entries)
    }

    /// Delete every materialized file, returning how many were removed
    pub async fn clear(&self) -> Result<usize> {
        let entries = self.entries().await?;
        for path in &entries {
            tokio::fs::remove_file(path)
                .await
                .map_err(|e| storage_error(path, e))?;
        }
        info!("Cleared {} cached results from {:?}", entries.len(), self.dir);
        Ok(entries.len())
    }
}

fn storage_error(path: &Path, err: std::io::Error) -> CoreError {
    CoreError::Storage(format!("{}: {}", path.display(), err))
}
