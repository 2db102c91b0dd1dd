//! # Photo Capture
//!
//! Adapts whatever produced a photo (camera, gallery picker, file on disk) into
//! a [`PhotoHandle`] the session can upload. The service only accepts JPEG, so
//! other formats are re-encoded here.

use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use emojiswap_client::PhotoHandle;
use image::codecs::jpeg::JpegEncoder;
use std::path::PathBuf;
use tracing::debug;

/// Quality used when re-encoding non-JPEG photos
pub const JPEG_QUALITY: u8 = 90;

const JPEG_MAGIC: [u8; 3] = [0xFF, 0xD8, 0xFF];

/// Source of photos. `Ok(None)` means the user backed out.
#[async_trait]
pub trait PhotoPicker: Send + Sync {
    async fn pick(&self) -> Result<Option<PhotoHandle>>;
}

/// Picks a photo from the local filesystem
#[derive(Debug, Clone)]
pub struct FilePicker {
    path: Option<PathBuf>,
}

impl FilePicker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// A picker whose user dismissed the dialog
    pub fn dismissed() -> Self {
        Self { path: None }
    }
}

#[async_trait]
impl PhotoPicker for FilePicker {
    async fn pick(&self) -> Result<Option<PhotoHandle>> {
        let Some(path) = &self.path else {
            debug!("Photo selection dismissed");
            return Ok(None);
        };

        let raw = tokio::fs::read(path).await?;
        if is_jpeg(&raw) {
            return Ok(Some(PhotoHandle::from_path(path.clone())));
        }

        debug!("Re-encoding {} as JPEG", path.display());
        let jpeg = tokio::task::spawn_blocking(move || normalize_to_jpeg(&raw))
            .await
            .map_err(|e| std::io::Error::other(e.to_string()))??;
        Ok(Some(PhotoHandle::from_bytes(jpeg)))
    }
}

pub fn is_jpeg(bytes: &[u8]) -> bool {
    bytes.starts_with(&JPEG_MAGIC)
}

/// Return JPEG bytes for any decodable image; JPEG input passes through.
pub fn normalize_to_jpeg(bytes: &[u8]) -> Result<Bytes> {
    if is_jpeg(bytes) {
        return Ok(Bytes::copy_from_slice(bytes));
    }

    let decoded = image::load_from_memory(bytes)?;
    let rgb = decoded.to_rgb8();

    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    encoder.encode_image(&rgb)?;
    Ok(Bytes::from(out))
}
