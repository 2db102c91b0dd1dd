//! # Emojiswap Core
//!
//! Client-side orchestration of the emoji face swap pipeline.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   PhotoHandle   ┌───────────────────────────────┐
//! │ PhotoPicker  │ ──────────────▶ │       ProcessingSession       │
//! └──────────────┘                 │                               │
//!                                  │  detect ─▶ configure ─▶ process│
//! ┌──────────────┐ config_changed  │        (seq numbers, epochs)  │
//! │   Adjuster   │ ──────────────▶ │                               │
//! │  (debounce)  │                 └───────┬───────────────┬───────┘
//! └──────────────┘                         │               │
//!                                  FaceSwapApi       ResultCache
//!                                  (HTTP client)    (local files)
//! ```
//!
//! The session never returns errors to its callers: every failure lands in the
//! published [`SessionSnapshot`] as an [`ErrorInfo`], and the caller chooses
//! between `retry()` and `reset()`.

pub mod adjust;
pub mod cache;
pub mod capture;
pub mod config;
pub mod error;
pub mod gallery;
pub mod session;
pub mod styles;

#[cfg(test)]
pub(crate) mod test_support;

pub use adjust::{Adjuster, Parameter};
pub use cache::{LocalResource, ResultCache};
pub use capture::{normalize_to_jpeg, FilePicker, PhotoPicker};
pub use config::{AppConfig, ConfigBuilder};
pub use error::{ErrorInfo, ErrorKind, Stage};
pub use gallery::{Gallery, GalleryEntry, GalleryFilter};
pub use session::{
    ProcessedArtifact, ProcessingSession, SessionOptions, SessionSnapshot, SessionStatus,
};
pub use styles::{EmojiStyle, StyleCatalog};

use emojiswap_client::ClientError;
use thiserror::Error;

/// Errors from the non-session APIs (configuration, storage, adjustments)
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unknown emoji style: {0}")]
    UnknownStyle(u32),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Client(#[from] ClientError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
