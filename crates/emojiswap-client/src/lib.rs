//! # Emojiswap Client
//!
//! Transport layer for the emoji face swap service.
//!
//! The service exposes two multipart endpoints:
//! - `POST {base}/api/v1/detect` - find faces in a photo
//! - `POST {base}/api/v1/process` - composite the selected emoji style onto the faces
//!
//! Every call is bounded by a client-side deadline (10s by default) and takes a
//! cooperative [`CancellationToken`] so callers can abandon requests for photos
//! they no longer care about.
//!
//! ## Error Taxonomy
//!
//! - [`ClientError::Timeout`]: the deadline elapsed before the service answered
//! - [`ClientError::Network`]: connection or transport failure
//! - [`ClientError::Service`]: non-2xx answer, message decoded from the body
//! - [`ClientError::Cancelled`]: the caller's token fired

pub mod http;
pub mod photo;
pub mod traits;
pub mod types;

pub use http::{Endpoints, HttpClient};
pub use photo::{PhotoHandle, PhotoSource};
pub use traits::FaceSwapApi;
pub use types::{DetectionResult, EmojiConfig, FaceRegion};

pub use tokio_util::sync::CancellationToken;

use std::time::Duration;
use thiserror::Error;

/// Transport errors
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx answer. The message is meant to be shown to the user verbatim.
    #[error("{message}")]
    Service { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid emoji config: {0}")]
    InvalidConfig(String),

    #[error("Photo unavailable: {0}")]
    Photo(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    /// Whether re-issuing the same request can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::Timeout(_) | ClientError::Network(_) | ClientError::Service { .. }
        )
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::InvalidResponse(err.to_string())
        } else {
            ClientError::Network(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
