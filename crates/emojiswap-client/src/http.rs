//! # HTTP Client
//!
//! Multipart implementation of [`FaceSwapApi`] for the face swap service.

use crate::{
    ClientError, DetectionResult, EmojiConfig, FaceSwapApi, PhotoHandle, Result,
};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DETECT_PATH: &str = "/api/v1/detect";
pub const PROCESS_PATH: &str = "/api/v1/process";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Multipart field carrying the photo
pub const FILE_FIELD: &str = "file";
/// Multipart field carrying the JSON encoded [`EmojiConfig`]
pub const CONFIG_FIELD: &str = "emoji_config";
const UPLOAD_FILE_NAME: &str = "photo.jpg";
const JPEG_MIME: &str = "image/jpeg";
const FALLBACK_ERROR: &str = "Request failed";

/// Endpoint paths relative to the base URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub detect: String,
    pub process: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            detect: DETECT_PATH.to_string(),
            process: PROCESS_PATH.to_string(),
        }
    }
}

/// Face swap service client
pub struct HttpClient {
    client: Client,
    base_url: String,
    endpoints: Endpoints,
    timeout: Duration,
}

impl HttpClient {
    /// Create a client for the service at `base_url`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            endpoints: Endpoints::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the per-call deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the endpoint paths
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn photo_form(&self, photo: &PhotoHandle) -> Result<Form> {
        let bytes = photo.read_bytes().await?;
        let part = Part::bytes(bytes.to_vec())
            .file_name(UPLOAD_FILE_NAME)
            .mime_str(JPEG_MIME)?;
        Ok(Form::new().part(FILE_FIELD, part))
    }

    /// Run `op` until it finishes, the deadline passes, or `cancel` fires.
    ///
    /// Dropping `op` drops the in-flight request, which aborts its connection.
    async fn with_deadline<T>(
        &self,
        cancel: &CancellationToken,
        op: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ClientError::Cancelled),
            _ = tokio::time::sleep(self.timeout) => {
                warn!("Request exceeded {}ms deadline", self.timeout.as_millis());
                Err(ClientError::Timeout(self.timeout))
            }
            result = op => result,
        }
    }

    async fn post(&self, path: &str, form: Form) -> Result<Response> {
        let url = self.url(path);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .header(ACCEPT, "application/json")
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.bytes().await.unwrap_or_default();
        Err(service_error(status, &body))
    }
}

#[async_trait]
impl FaceSwapApi for HttpClient {
    fn name(&self) -> &str {
        "http"
    }

    async fn detect_faces(
        &self,
        photo: &PhotoHandle,
        cancel: &CancellationToken,
    ) -> Result<DetectionResult> {
        self.with_deadline(cancel, async {
            let form = self.photo_form(photo).await?;
            let response = self.post(&self.endpoints.detect, form).await?;
            let body = response.bytes().await?;

            let detection: DetectionResult = serde_json::from_slice(&body).map_err(|e| {
                ClientError::InvalidResponse(format!("Malformed detection body: {}", e))
            })?;
            debug!(photo = %photo.id(), faces = detection.face_count(), "Detection finished");
            Ok(detection)
        })
        .await
    }

    async fn process_image(
        &self,
        photo: &PhotoHandle,
        config: &EmojiConfig,
        cancel: &CancellationToken,
    ) -> Result<Bytes> {
        let wire_config = config.to_wire()?;

        self.with_deadline(cancel, async {
            let form = self.photo_form(photo).await?.text(CONFIG_FIELD, wire_config);
            let response = self.post(&self.endpoints.process, form).await?;

            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            if !is_image_body(&content_type) {
                return Err(ClientError::InvalidResponse(format!(
                    "Expected an image, got {}",
                    content_type
                )));
            }

            let bytes = response.bytes().await?;
            if bytes.is_empty() {
                return Err(ClientError::InvalidResponse("Empty image body".to_string()));
            }
            debug!(photo = %photo.id(), size = bytes.len(), "Processing finished");
            Ok(bytes)
        })
        .await
    }
}

/// Untyped and octet-stream bodies pass as images
fn is_image_body(content_type: &str) -> bool {
    content_type.is_empty()
        || content_type.starts_with("image/")
        || content_type.starts_with("application/octet-stream")
}

/// Decode a non-2xx answer.
///
/// JSON bodies yield `detail`, then `message`, then a generic message; anything
/// else falls back to the HTTP status text.
pub(crate) fn service_error(status: StatusCode, body: &[u8]) -> ClientError {
    let message = match serde_json::from_slice::<Value>(body) {
        Ok(value) => error_field(&value, "detail")
            .or_else(|| error_field(&value, "message"))
            .unwrap_or_else(|| FALLBACK_ERROR.to_string()),
        Err(_) => status
            .canonical_reason()
            .unwrap_or(FALLBACK_ERROR)
            .to_string(),
    };

    ClientError::Service {
        status: status.as_u16(),
        message,
    }
}

fn error_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
