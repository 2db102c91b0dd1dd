//! # Service Trait
//!
//! The contract every face swap backend implementation fulfils. The processing
//! session only talks to this trait, so tests can substitute scripted doubles.

use crate::{DetectionResult, EmojiConfig, PhotoHandle, Result};
use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait FaceSwapApi: Send + Sync {
    /// Implementation name, used in logs
    fn name(&self) -> &str;

    /// Find the faces in `photo`.
    ///
    /// Resolves with [`ClientError::Cancelled`](crate::ClientError::Cancelled)
    /// as soon as `cancel` fires.
    async fn detect_faces(
        &self,
        photo: &PhotoHandle,
        cancel: &CancellationToken,
    ) -> Result<DetectionResult>;

    /// Composite the emoji described by `config` onto `photo`, returning the
    /// encoded result image.
    async fn process_image(
        &self,
        photo: &PhotoHandle,
        config: &EmojiConfig,
        cancel: &CancellationToken,
    ) -> Result<Bytes>;
}
