//! # Photo Handles
//!
//! Opaque, immutable references to the bytes of one captured or picked photo.

use crate::{ClientError, Result};
use bytes::Bytes;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

/// Where the photo bytes live
#[derive(Debug, Clone)]
pub enum PhotoSource {
    /// JPEG file on local storage
    File(PathBuf),
    /// JPEG bytes already in memory
    Memory(Bytes),
}

/// Reference to one photo.
///
/// Cloning is cheap and every clone refers to the same photo. Two handles are
/// equal only if they come from the same capture, even when the bytes match.
#[derive(Clone)]
pub struct PhotoHandle {
    inner: Arc<PhotoInner>,
}

struct PhotoInner {
    id: Uuid,
    source: PhotoSource,
}

impl PhotoHandle {
    /// Reference a JPEG file on disk
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::new(PhotoSource::File(path.into()))
    }

    /// Wrap JPEG bytes held in memory
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self::new(PhotoSource::Memory(bytes.into()))
    }

    fn new(source: PhotoSource) -> Self {
        Self {
            inner: Arc::new(PhotoInner {
                id: Uuid::new_v4(),
                source,
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn source(&self) -> &PhotoSource {
        &self.inner.source
    }

    /// Load the bytes to upload
    pub async fn read_bytes(&self) -> Result<Bytes> {
        match &self.inner.source {
            PhotoSource::Memory(bytes) => Ok(bytes.clone()),
            PhotoSource::File(path) => tokio::fs::read(path)
                .await
                .map(Bytes::from)
                .map_err(|e| ClientError::Photo(format!("{}: {}", path.display(), e))),
        }
    }
}

impl PartialEq for PhotoHandle {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for PhotoHandle {}

impl fmt::Debug for PhotoHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("PhotoHandle");
        s.field("id", &self.inner.id);
        match &self.inner.source {
            PhotoSource::File(path) => s.field("path", path),
            PhotoSource::Memory(bytes) => s.field("bytes", &bytes.len()),
        };
        s.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_identity() {
        let photo = PhotoHandle::from_bytes(&b"jpeg"[..]);
        let copy = photo.clone();
        assert_eq!(photo, copy);
        assert_eq!(photo.id(), copy.id());
    }

    #[test]
    fn test_same_bytes_different_capture() {
        let a = PhotoHandle::from_bytes(&b"jpeg"[..]);
        let b = PhotoHandle::from_bytes(&b"jpeg"[..]);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_read_memory_bytes() {
        let photo = PhotoHandle::from_bytes(vec![0xFF, 0xD8, 0xFF]);
        let bytes = photo.read_bytes().await.unwrap();
        assert_eq!(&bytes[..], &[0xFF, 0xD8, 0xFF]);
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let photo = PhotoHandle::from_path("/definitely/not/here/photo.jpg");
        let err = photo.read_bytes().await.unwrap_err();
        assert!(matches!(err, ClientError::Photo(_)));
    }
}
